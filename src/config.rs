//! Declarative configuration.
//!
//! The builder is the primary configuration surface; this module adds a
//! serde-deserializable subset for deployments that configure tracing from a
//! file. It covers the options that are plain data (naming, id width, join
//! capability, and a sampling rate) and converts into a
//! [`Builder`](crate::lifecycle::Builder) for everything else.

use crate::error::Result;
use crate::lifecycle::{Builder, Tracing};
use crate::sampler::{AlwaysSampler, NeverSampler, RateSampler};
use serde::{Deserialize, Serialize};

/// File-loadable tracing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TracingConfig {
    /// Names the local endpoint on reported spans.
    pub local_service_name: String,

    /// Generate 128-bit trace ids for new traces.
    pub trace_id_128bit: bool,

    /// Whether joins are allowed; `false` forces child-on-join.
    pub supports_join: bool,

    /// Fraction of traces to retain, `0.0..=1.0`.
    pub sample_rate: f32,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            local_service_name: "unknown".to_string(),
            trace_id_128bit: false,
            supports_join: true,
            sample_rate: 1.0,
        }
    }
}

impl TracingConfig {
    /// Creates a configuration with the given service name and defaults.
    pub fn new(local_service_name: impl Into<String>) -> Self {
        Self {
            local_service_name: local_service_name.into(),
            ..Default::default()
        }
    }

    /// Sets the sampling rate.
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Enables 128-bit trace ids.
    pub fn with_trace_id_128bit(mut self, trace_id_128bit: bool) -> Self {
        self.trace_id_128bit = trace_id_128bit;
        self
    }

    /// Sets whether joins are allowed.
    pub fn with_supports_join(mut self, supports_join: bool) -> Self {
        self.supports_join = supports_join;
        self
    }

    /// Converts into a [`Builder`], validating the sampling rate.
    pub fn into_builder(self) -> Result<Builder> {
        let builder = Tracing::builder()
            .with_local_service_name(self.local_service_name)
            .with_trace_id_128bit(self.trace_id_128bit)
            .with_supports_join(self.supports_join);
        let builder = if self.sample_rate >= 1.0 && self.sample_rate.is_finite() {
            RateSampler::new(self.sample_rate)?;
            builder.with_sampler(AlwaysSampler)
        } else if self.sample_rate <= 0.0 {
            RateSampler::new(self.sample_rate)?;
            builder.with_sampler(NeverSampler)
        } else {
            builder.with_sampler(RateSampler::new(self.sample_rate)?)
        };
        Ok(builder)
    }
}
