//! # Tracewire - A Distributed Tracing Client Library
//!
//! Tracewire records causally-linked timed operations (spans) inside a
//! process and forwards the finished ones to an external collector through a
//! pluggable reporter. It mints trace and span identifiers under a sticky
//! sampling decision, continues traces arriving on the wire (including joins
//! where two services share one span id), tracks the active span on each
//! thread, and keeps the unsampled path cheap enough to leave enabled
//! everywhere.
//!
//! ## Core Concepts
//!
//! - **Trace**: the set of spans sharing a trace id across services
//! - **Span**: one timed operation with a name, tags, and annotations
//! - **Context**: the immutable identifier tuple carried in-process and on
//!   the wire to link spans
//! - **Sampling**: the per-trace record-or-discard decision, made once and
//!   sticky for the whole trace
//! - **Join**: taking over an upstream span so client and server report two
//!   halves under one span id
//! - **Scope**: a LIFO activation of a context as "current" on a thread
//!
//! ## Architecture Overview
//!
//! ```text
//! inbound carrier ──> Propagation::extract ──> TraceContextOrFlags
//!                                                      │
//!                                                      ▼
//!                       Sampler ◀────────────── Tracer (new/join/child)
//!                                                      │
//!                                                      ▼
//!                                          Span (real or no-op)
//!                                                      │
//!                                 user code annotates, then finish
//!                                                      │
//!                                                      ▼
//!                     in-flight table ──> FinishedSpan ──> handlers ──> Reporter
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use tracewire::prelude::*;
//!
//! let tracing = Tracing::builder()
//!     .with_local_service_name("frontend")
//!     .with_span_reporter(LoggingReporter)
//!     .build();
//!
//! let tracer = tracing.tracer();
//! let span = tracer.new_trace();
//! span.name("get /users").kind(Kind::Server).start();
//! {
//!     let _scope = tracer.with_span_in_scope(Some(&span));
//!     // work in scope; tracer.current_span() sees this span
//! }
//! span.finish();
//! tracing.close();
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::clock::{Clock, FixedClock, SystemClock, TickClock};
    pub use crate::config::TracingConfig;
    pub use crate::context::{
        ContextVariant, Extra, SamplingFlags, TraceContext, TraceContextOrFlags, TraceIdContext,
    };
    pub use crate::current::{
        CurrentTraceContext, Scope, StrictCurrentTraceContext, ThreadLocalCurrentTraceContext,
    };
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{Error, Result};
    pub use crate::lifecycle::Tracing;
    pub use crate::propagation::{
        B3Propagation, Extractor, Injector, Propagation, PropagationFactory, TracestateFormat,
    };
    pub use crate::reporter::{
        Annotation, FinishedSpan, FinishedSpanHandler, Kind, LoggingReporter, NoopReporter,
        Reporter,
    };
    pub use crate::sampler::{AlwaysSampler, NeverSampler, RateSampler, Sampler};
    pub use crate::span::Span;
    pub use crate::tracer::Tracer;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
///
/// Errors only surface at validating construction sites (context builders,
/// hex parsing, sampler rates). Span creation and recording never fail.
pub mod error;

/// Trace contexts, sampling flags, and the partial-context shapes produced
/// by extraction.
pub mod context;

/// Network endpoints naming the local service and remote peers.
pub mod endpoint;

// ============================================================================
// Policies
// ============================================================================

/// Sampling predicates: always, never, and deterministic rate-based.
pub mod sampler;

/// Epoch-microsecond timestamp sources, including test clocks.
pub mod clock;

/// Random nonzero identifier generation.
pub mod id_generator;

// ============================================================================
// Wire Formats
// ============================================================================

/// Header propagation: carrier abstractions, the B3 codec, and the W3C
/// `tracestate` vendor-entry codec.
pub mod propagation;

// ============================================================================
// Recording Pipeline
// ============================================================================

/// In-flight span table and the finish/report pipeline.
mod recorder;

/// Finished-span records, reporter and handler traits, and stock sinks.
pub mod reporter;

/// User-facing span handles, real and no-op.
pub mod span;

// ============================================================================
// Orchestration
// ============================================================================

/// Per-thread current-context stack with scoped acquisition.
pub mod current;

/// The tracer: every way a span comes into being.
pub mod tracer;

/// Process-wide lifecycle: the builder, the current-instance registry, and
/// the global noop toggle.
pub mod lifecycle;

/// Serde-loadable configuration that converts into a builder.
pub mod config;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Tracewire.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
