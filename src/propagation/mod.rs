//! Header propagation.
//!
//! Propagation moves trace state across process boundaries: an injector
//! writes the identifiers of an outgoing request into a carrier (HTTP
//! headers, message attributes), and an extractor reads whatever a peer sent
//! into a [`TraceContextOrFlags`]. Carriers are abstracted behind the
//! [`Injector`] and [`Extractor`] traits so codecs stay transport-agnostic.
//!
//! A [`PropagationFactory`] also describes the capabilities of its wire
//! format: whether it carries the single-span-id convention (joins) and
//! whether it requires 128-bit trace ids. The tracer consults both when
//! assembling its defaults.
//!
//! Extraction never fails: a malformed carrier yields
//! [`SamplingFlags::EMPTY`](crate::context::SamplingFlags::EMPTY) and the
//! request simply starts a new trace locally.

pub mod b3;
pub mod tracestate;

pub use b3::B3Propagation;
pub use tracestate::TracestateFormat;

use crate::context::{TraceContext, TraceContextOrFlags};
use std::collections::HashMap;
use std::sync::Arc;

/// Writes propagated fields into an outgoing carrier.
pub trait Injector {
    /// Sets a field, replacing any previous value for the key.
    fn set(&mut self, key: &str, value: String);
}

/// Reads propagated fields from an incoming carrier.
pub trait Extractor {
    /// Returns the value of a field, if present.
    fn get(&self, key: &str) -> Option<&str>;
}

impl Injector for HashMap<String, String> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

impl Extractor for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

/// A wire codec for trace state.
pub trait Propagation: Send + Sync {
    /// The header names this codec owns.
    fn keys(&self) -> &[&'static str];

    /// Writes `context` into `carrier`.
    fn inject(&self, context: &TraceContext, carrier: &mut dyn Injector);

    /// Reads trace state from `carrier`. Malformed or absent input yields
    /// empty sampling flags, never an error.
    fn extract(&self, carrier: &dyn Extractor) -> TraceContextOrFlags;
}

/// Builds a [`Propagation`] codec and reports its wire-format capabilities.
pub trait PropagationFactory: Send + Sync {
    /// Creates the codec.
    fn create(&self) -> Arc<dyn Propagation>;

    /// Whether the wire format carries the single-span-id convention. When
    /// `false`, an upstream span id becomes the parent of a new child
    /// instead of being shared.
    fn supports_join(&self) -> bool {
        false
    }

    /// Whether this format requires 128-bit trace ids.
    fn requires_128bit_trace_id(&self) -> bool {
        false
    }
}
