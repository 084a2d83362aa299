//! Finished-span records and reporting sinks.
//!
//! When a span finishes, its accumulated state is converted into a
//! [`FinishedSpan`] and handed to the configured [`Reporter`]. The record
//! serializes to the collector's JSON shape: camelCase keys in declaration
//! order, absent fields omitted, tags in insertion order. The tracer's
//! diagnostic output reuses the same encoder, so the serialized field order
//! here is observable.
//!
//! Reporters are externally owned and may buffer, batch, or drop; delivery is
//! not guaranteed. A reporter must not panic back into the tracer: the
//! recorder catches and discards panics, counting the span as reported.

use crate::endpoint::Endpoint;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The "kind" of a span, which disambiguates how its timestamp, duration,
/// and remote endpoint are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// The client side of an RPC. The remote endpoint is the server.
    Client,
    /// The server side of an RPC. The remote endpoint is the client.
    Server,
    /// A message sent to a broker. The remote endpoint is the broker.
    Producer,
    /// A message received from a broker. The remote endpoint is the broker.
    Consumer,
}

/// A timestamped event within a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Epoch microseconds when the event occurred.
    pub timestamp: u64,
    /// What happened, as a short string.
    pub value: String,
}

/// A completed (or snapshotted in-flight) span in the collector's shape.
///
/// Field declaration order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedSpan {
    /// Trace id as 16 or 32 lowercase hex characters.
    pub trace_id: String,

    /// Parent span id as 16 lowercase hex characters, absent for roots.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,

    /// Span id as 16 lowercase hex characters.
    pub id: String,

    /// RPC/messaging classification, absent for local spans.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<Kind>,

    /// Low-cardinality operation name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,

    /// Start time in epoch microseconds, absent if the span never started.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<u64>,

    /// Microseconds between start and finish, absent until finished.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<u64>,

    /// The service that recorded this span.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub local_endpoint: Option<Endpoint>,

    /// The other side of an RPC or messaging operation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remote_endpoint: Option<Endpoint>,

    /// Timestamped events, in insertion order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub annotations: Vec<Annotation>,

    /// Last-write-wins key/value context, serialized in insertion order.
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub tags: IndexMap<String, String>,

    /// Whether this span id was taken over from the caller.
    #[serde(skip_serializing_if = "is_false", default)]
    pub shared: bool,

    /// Whether this span was forcibly recorded.
    #[serde(skip_serializing_if = "is_false", default)]
    pub debug: bool,
}

#[inline]
fn is_false(v: &bool) -> bool {
    !*v
}

impl fmt::Display for FinishedSpan {
    /// One-line JSON, identical to the serialized wire shape.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// A sink for finished spans.
///
/// The `Display` implementation participates in the tracer's diagnostic
/// output, so keep it short and stable (e.g. `MyReporter{}`).
pub trait Reporter: Send + Sync + fmt::Display {
    /// Accepts one finished span. Must not panic back into the tracer.
    fn report(&self, span: FinishedSpan);
}

/// Discards every span. Useful for tests and disabled setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _span: FinishedSpan) {}
}

impl fmt::Display for NoopReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoopReporter{}")
    }
}

/// Emits each finished span as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

impl Reporter for LoggingReporter {
    fn report(&self, span: FinishedSpan) {
        tracing::info!(span = %span, "finished span");
    }
}

impl fmt::Display for LoggingReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoggingReporter{}")
    }
}

/// A post-finish interceptor applied before the reporter.
///
/// Handlers run in registration order and may rewrite the record. Returning
/// `false` drops the span without reporting it.
pub trait FinishedSpanHandler: Send + Sync {
    /// Inspects or mutates a finished span. Return `false` to drop it.
    fn handle(&self, span: &mut FinishedSpan) -> bool;
}
