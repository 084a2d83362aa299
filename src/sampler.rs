//! Sampling policies.
//!
//! A [`Sampler`] decides, from a trace id alone, whether a trace is recorded.
//! The decision must be deterministic for a given id so that every service
//! participating in a trace reaches the same answer independently. Once a
//! context carries a definite decision, it is never re-sampled; samplers are
//! only consulted for undecided input.

use crate::error::{Error, Result};

/// A pure predicate from trace id to sampling decision.
///
/// Implementations must be deterministic: the same `trace_id` always yields
/// the same answer within a process, and salt-free implementations yield the
/// same answer across processes.
pub trait Sampler: Send + Sync {
    /// Returns whether the trace identified by `trace_id` should be recorded.
    fn is_sampled(&self, trace_id: u64) -> bool;
}

/// Samples every trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSampler;

impl Sampler for AlwaysSampler {
    fn is_sampled(&self, _trace_id: u64) -> bool {
        true
    }
}

/// Samples no traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSampler;

impl Sampler for NeverSampler {
    fn is_sampled(&self, _trace_id: u64) -> bool {
        false
    }
}

/// Samples a deterministic fraction of traces by id.
///
/// The id is reduced modulo 10 000 and compared against a threshold derived
/// from the rate, so the decision is a pure function of the trace id. No
/// per-process salt is mixed in: all services sharing a trace id agree.
///
/// Rates are effectively quantized to 0.01% steps.
#[derive(Debug, Clone, Copy)]
pub struct RateSampler {
    threshold: u64,
}

impl RateSampler {
    /// Creates a sampler retaining approximately `rate` of all traces.
    ///
    /// Returns an error unless `rate` is within `0.0..=1.0`.
    pub fn new(rate: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&rate) || rate.is_nan() {
            return Err(Error::InvalidSampleRate(rate));
        }
        Ok(Self {
            threshold: (rate * 10_000.0) as u64,
        })
    }
}

impl Sampler for RateSampler {
    fn is_sampled(&self, trace_id: u64) -> bool {
        trace_id % 10_000 < self.threshold
    }
}
