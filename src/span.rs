//! User-facing span handles.
//!
//! A [`Span`] is either real or no-op. Both carry a valid [`TraceContext`] so
//! instrumentation can always read and propagate identifiers, but a no-op
//! span short-circuits every mutator: unsampled traces cost a context clone
//! and nothing else. Real spans write through the in-flight table keyed by
//! their context, so two handles lifted from the same context share one
//! record.

use crate::context::TraceContext;
use crate::endpoint::Endpoint;
use crate::recorder::Recorder;
use crate::reporter::{Annotation, Kind};
use std::fmt;
use std::sync::Arc;

/// A timed operation in progress, real or no-op.
pub enum Span {
    /// Records through the in-flight table and reports on finish.
    Real(RealSpan),
    /// Carries identifiers only; every mutator is a no-op.
    Noop(TraceContext),
}

/// The recording half of [`Span`].
pub struct RealSpan {
    context: TraceContext,
    recorder: Arc<Recorder>,
}

impl Span {
    pub(crate) fn real(context: TraceContext, recorder: Arc<Recorder>) -> Self {
        Span::Real(RealSpan { context, recorder })
    }

    pub(crate) fn noop(context: TraceContext) -> Self {
        Span::Noop(context)
    }

    /// The identifier tuple this span operates under.
    pub fn context(&self) -> &TraceContext {
        match self {
            Span::Real(span) => &span.context,
            Span::Noop(context) => context,
        }
    }

    /// Whether this span discards all recording.
    pub fn is_noop(&self) -> bool {
        matches!(self, Span::Noop(_))
    }

    /// Sets the operation name.
    pub fn name(&self, name: &str) -> &Self {
        if let Span::Real(span) = self {
            let name = name.to_string();
            span.recorder
                .with_span(&span.context, |s| s.name = Some(name));
        }
        self
    }

    /// Classifies this span as one side of an RPC or messaging operation.
    pub fn kind(&self, kind: Kind) -> &Self {
        if let Span::Real(span) = self {
            span.recorder
                .with_span(&span.context, |s| s.kind = Some(kind));
        }
        self
    }

    /// Sets a tag. A later write to the same name replaces the value.
    pub fn tag(&self, name: &str, value: &str) -> &Self {
        if let Span::Real(span) = self {
            let (name, value) = (name.to_string(), value.to_string());
            span.recorder.with_span(&span.context, |s| {
                s.tags.insert(name, value);
            });
        }
        self
    }

    /// Records a timestamped event at the current clock reading.
    pub fn annotate(&self, value: &str) -> &Self {
        if let Span::Real(span) = self {
            let timestamp = span.recorder.clock().now_micros();
            self.annotate_at(timestamp, value);
        }
        self
    }

    /// Records a timestamped event at an explicit time.
    pub fn annotate_at(&self, timestamp: u64, value: &str) -> &Self {
        if let Span::Real(span) = self {
            let value = value.to_string();
            span.recorder.with_span(&span.context, |s| {
                s.annotations.push(Annotation { timestamp, value });
            });
        }
        self
    }

    /// Sets the remote endpoint of an RPC or messaging span.
    pub fn remote_endpoint(&self, endpoint: Endpoint) -> &Self {
        if let Span::Real(span) = self {
            span.recorder
                .with_span(&span.context, |s| s.remote_endpoint = Some(endpoint));
        }
        self
    }

    /// Records that this operation failed. Converted to an `error` tag on
    /// finish unless one was set explicitly.
    pub fn error(&self, message: &str) -> &Self {
        if let Span::Real(span) = self {
            let message = message.to_string();
            span.recorder
                .with_span(&span.context, |s| s.error = Some(message));
        }
        self
    }

    /// Starts the span at the current clock reading.
    pub fn start(&self) -> &Self {
        if let Span::Real(span) = self {
            let timestamp = span.recorder.clock().now_micros();
            self.start_with_timestamp(timestamp);
        }
        self
    }

    /// Starts the span at an explicit epoch-microsecond timestamp.
    pub fn start_with_timestamp(&self, timestamp: u64) -> &Self {
        if let Span::Real(span) = self {
            span.recorder
                .with_span(&span.context, |s| s.start_timestamp = Some(timestamp));
        }
        self
    }

    /// Finishes the span at the current clock reading and reports it.
    ///
    /// Finishing twice reports once.
    pub fn finish(&self) {
        if let Span::Real(span) = self {
            let timestamp = span.recorder.clock().now_micros();
            span.recorder.finish(&span.context, timestamp);
        }
    }

    /// Finishes the span at an explicit epoch-microsecond timestamp.
    pub fn finish_with_timestamp(&self, timestamp: u64) {
        if let Span::Real(span) = self {
            span.recorder.finish(&span.context, timestamp);
        }
    }

    /// Drops the in-flight record without reporting anything.
    pub fn abandon(&self) {
        if let Span::Real(span) = self {
            span.recorder.abandon(&span.context);
        }
    }

    /// Reports the span in its current state, without a duration. Later
    /// mutations or finishes are no-ops.
    pub fn flush(&self) {
        if let Span::Real(span) = self {
            span.recorder.flush(&span.context);
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Real(span) => write!(f, "RealSpan({})", span.context),
            Span::Noop(context) => write!(f, "NoopSpan({context})"),
        }
    }
}
