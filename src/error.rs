//! Error types for Tracewire.
//!
//! This module defines the error types used throughout Tracewire. They only
//! surface at validating construction sites: building a trace context from
//! raw identifiers, parsing hex identifiers off the wire, and configuring a
//! sampler. Span creation and span recording never return errors to callers;
//! those paths correct bad input or degrade to a no-op span instead.

use thiserror::Error;

/// Result type alias for Tracewire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Tracewire.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Identifier Errors
    // ========================================================================
    /// A trace context was built with a zero trace id.
    #[error("Trace id must be nonzero")]
    InvalidTraceId,

    /// A trace context was built with a zero span id.
    #[error("Span id must be nonzero")]
    InvalidSpanId,

    /// An identifier string was not fixed-width lowercase hex.
    #[error("Malformed {field} '{value}': expected {width} lowercase hex characters")]
    MalformedId {
        /// Which identifier field was being parsed
        field: &'static str,
        /// The offending input
        value: String,
        /// Expected number of hex characters
        width: usize,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A sampling rate outside `0.0..=1.0` was supplied.
    #[error("Sample rate {0} is not in 0.0..=1.0")]
    InvalidSampleRate(f32),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new malformed-identifier error.
    pub fn malformed_id(field: &'static str, value: impl Into<String>, width: usize) -> Self {
        Self::MalformedId {
            field,
            value: value.into(),
            width,
        }
    }
}
