//! The tracer: span creation under a sampling policy.
//!
//! Every way a span can come into being routes through here. The entry
//! points differ in where the identifiers come from:
//!
//! - [`new_trace`](Tracer::new_trace): mint fresh ids, consult the sampler
//! - [`join_span`](Tracer::join_span): take over a caller's ids, sharing the
//!   span id across both services
//! - [`new_child`](Tracer::new_child): same trace, fresh span id, parented
//!   on the given context
//! - [`next_span_with`](Tracer::next_span_with): dispatch on whatever shape
//!   a codec extracted (full context, trace id only, or bare flags)
//! - [`to_span`](Tracer::to_span): lift an existing context without minting
//!   anything
//!
//! All of them are infallible: illegal input is corrected (zero ids are
//! regenerated) and unsampled or globally disabled tracing yields a no-op
//! span that still carries valid identifiers. Sampling is sticky: once a
//! context holds a decision, neither it nor its children consult the sampler
//! again.

use crate::context::{
    ContextVariant, Extra, SamplingFlags, TraceContext, TraceContextOrFlags,
};
use crate::current::{CurrentTraceContext, Scope};
use crate::id_generator::IdGenerator;
use crate::recorder::Recorder;
use crate::span::Span;
use crate::sampler::Sampler;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

/// Creates and routes spans. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Tracer {
    sampler: Arc<dyn Sampler>,
    current: Arc<dyn CurrentTraceContext>,
    recorder: Arc<Recorder>,
    id_generator: IdGenerator,
    trace_id_128bit: bool,
    supports_join: bool,
    noop: Arc<AtomicBool>,
}

impl Tracer {
    pub(crate) fn new(
        sampler: Arc<dyn Sampler>,
        current: Arc<dyn CurrentTraceContext>,
        recorder: Arc<Recorder>,
        trace_id_128bit: bool,
        supports_join: bool,
        noop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sampler,
            current,
            recorder,
            id_generator: IdGenerator,
            trace_id_128bit,
            supports_join,
            noop,
        }
    }

    // ========================================================================
    // Span creation
    // ========================================================================

    /// Starts a new root span, consulting the sampler for the decision.
    pub fn new_trace(&self) -> Span {
        self.new_trace_with(SamplingFlags::EMPTY)
    }

    /// Starts a new root span honoring explicit sampling flags. Empty flags
    /// behave like [`new_trace`](Self::new_trace).
    pub fn new_trace_with(&self, flags: SamplingFlags) -> Span {
        self.root_span(flags, Vec::new())
    }

    /// Takes over the span of an inbound context, sharing its span id with
    /// the caller.
    ///
    /// If the wire format (or configuration) does not support joining, this
    /// degrades to [`new_child`](Self::new_child). An undecided sampling
    /// state is resolved here, so the decision sticks for the whole trace.
    pub fn join_span(&self, context: &TraceContext) -> Span {
        self.join_internal(context.clone())
    }

    /// Starts a span in the same trace as `parent`, with a fresh span id
    /// parented on `parent`'s.
    pub fn new_child(&self, parent: &TraceContext) -> Span {
        self.child_span(parent, SamplingFlags::EMPTY, Vec::new())
    }

    /// Equivalent to [`next_span_with`](Self::next_span_with) on an empty
    /// extraction: continues the current span if one is in scope, otherwise
    /// starts a new trace.
    pub fn next_span(&self) -> Span {
        self.next_span_with(TraceContextOrFlags::empty())
    }

    /// Continues whatever trace state a codec extracted.
    ///
    /// A full context joins (respecting join support); a trace id mints a
    /// fresh span id under it; bare flags child off the current span when
    /// one is in scope and start a new trace otherwise. Extracted payloads
    /// are appended after the base context's own, preserving order.
    pub fn next_span_with(&self, extracted: TraceContextOrFlags) -> Span {
        let (variant, extra) = extracted.into_parts();
        match variant {
            ContextVariant::Context(context) => {
                let context = context.to_builder().extend_extra(extra).build_internal();
                self.join_internal(context)
            }
            ContextVariant::TraceId(partial) => {
                let trace_id = if partial.trace_id != 0 {
                    partial.trace_id
                } else {
                    self.id_generator.next_id()
                };
                let sampled = partial
                    .flags
                    .sampled()
                    .unwrap_or_else(|| self.decide(trace_id));
                let current_extra: Vec<Extra> = self
                    .current
                    .get()
                    .map(|c| c.extra().to_vec())
                    .unwrap_or_default();
                let context = TraceContext::builder()
                    .trace_id_high(partial.trace_id_high)
                    .trace_id(trace_id)
                    .span_id(self.id_generator.next_id())
                    .sampled(sampled)
                    .debug(partial.flags.debug())
                    .extend_extra(current_extra)
                    .extend_extra(extra)
                    .build_internal();
                self.materialize(context)
            }
            ContextVariant::Flags(flags) => match self.current.get() {
                Some(parent) => self.child_span(&parent, flags, extra),
                None => self.root_span(flags, extra),
            },
        }
    }

    /// Lifts a raw context into a span without changing identifiers.
    ///
    /// Repeated calls with equal contexts converge on the same in-flight
    /// record. An unsampled context lifts to a no-op span.
    pub fn to_span(&self, context: &TraceContext) -> Span {
        self.materialize(context.clone())
    }

    // ========================================================================
    // Current span
    // ========================================================================

    /// Installs `span`'s context as current on the calling thread, or clears
    /// the current context for `None`. Dropping the scope restores.
    pub fn with_span_in_scope(&self, span: Option<&Span>) -> Scope {
        self.current.new_scope(span.map(|s| s.context().clone()))
    }

    /// The span whose context is current on the calling thread, if any.
    pub fn current_span(&self) -> Option<Span> {
        self.current.get().map(|context| self.to_span(&context))
    }

    /// The scope manager this tracer installs contexts through.
    pub fn current_trace_context(&self) -> &Arc<dyn CurrentTraceContext> {
        &self.current
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn root_span(&self, flags: SamplingFlags, extra: Vec<Extra>) -> Span {
        let (trace_id_high, trace_id) = if self.trace_id_128bit {
            self.id_generator.next_trace_id_128()
        } else {
            (0, self.id_generator.next_id())
        };
        let sampled = flags.sampled().unwrap_or_else(|| self.decide(trace_id));
        let context = TraceContext::builder()
            .trace_id_high(trace_id_high)
            .trace_id(trace_id)
            .span_id(trace_id)
            .sampled(sampled)
            .debug(flags.debug())
            .extend_extra(extra)
            .build_internal();
        self.materialize(context)
    }

    fn join_internal(&self, context: TraceContext) -> Span {
        if !self.supports_join {
            return self.child_span(&context, SamplingFlags::EMPTY, Vec::new());
        }
        let mut builder = context.to_builder().shared(true);
        if context.sampled().is_none() {
            builder = builder.sampled(self.decide(context.trace_id()));
        }
        self.materialize(builder.build_internal())
    }

    fn child_span(
        &self,
        parent: &TraceContext,
        overlay: SamplingFlags,
        extra_tail: Vec<Extra>,
    ) -> Span {
        let sampled = overlay
            .sampled()
            .or_else(|| parent.sampled())
            .unwrap_or_else(|| self.decide(parent.trace_id()));
        let context = TraceContext::builder()
            .trace_id_high(parent.trace_id_high())
            .trace_id(parent.trace_id())
            .parent_id(Some(parent.span_id()))
            .span_id(self.id_generator.next_id())
            .sampled(sampled)
            .debug(parent.debug() || overlay.debug())
            .extend_extra(parent.extra().iter().cloned())
            .extend_extra(extra_tail)
            .build_internal();
        self.materialize(context)
    }

    fn materialize(&self, context: TraceContext) -> Span {
        if self.is_noop() || context.sampled() == Some(false) {
            Span::noop(context)
        } else {
            Span::real(context, Arc::clone(&self.recorder))
        }
    }

    fn decide(&self, trace_id: u64) -> bool {
        if self.is_noop() {
            return false;
        }
        match catch_unwind(AssertUnwindSafe(|| self.sampler.is_sampled(trace_id))) {
            Ok(sampled) => sampled,
            Err(_) => {
                static WARNED: Once = Once::new();
                WARNED.call_once(|| {
                    tracing::warn!("sampler panicked; treating undecided traces as not sampled");
                });
                false
            }
        }
    }

    fn is_noop(&self) -> bool {
        self.noop.load(Ordering::Relaxed)
    }
}

impl fmt::Display for Tracer {
    /// Diagnostic rendering: the current span's ids when one is in scope,
    /// otherwise one-line JSON per still-open span, the noop flag when set,
    /// and always the reporter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tracer{")?;
        if self.is_noop() {
            f.write_str("noop=true, ")?;
        }
        if let Some(context) = self.current.get() {
            write!(f, "currentSpan={context}, ")?;
        } else if !self.recorder.is_empty() {
            if let Ok(json) = serde_json::to_string(&self.recorder.snapshot()) {
                write!(f, "inFlight={json}, ")?;
            }
        }
        write!(f, "reporter={}}}", self.recorder.reporter())
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
