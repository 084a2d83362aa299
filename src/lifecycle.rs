//! Process-wide tracing lifecycle.
//!
//! A [`Tracing`] instance bundles one configured [`Tracer`] with its
//! propagation codec and the flags shared across clones. Construction
//! registers the instance in a process-wide registry so library glue can
//! find it via [`Tracing::current`] without threading a handle everywhere;
//! [`close`](Tracing::close) deregisters it. Multiple instances may coexist
//! (tests rely on this); `current` returns the most recently built one that
//! has not been closed.

use crate::clock::{Clock, SystemClock};
use crate::current::{CurrentTraceContext, ThreadLocalCurrentTraceContext};
use crate::endpoint::Endpoint;
use crate::propagation::{B3Propagation, Propagation, PropagationFactory};
use crate::recorder::Recorder;
use crate::reporter::{FinishedSpanHandler, LoggingReporter, Reporter};
use crate::sampler::{AlwaysSampler, Sampler};
use crate::tracer::Tracer;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

static REGISTRY: Lazy<Mutex<Vec<Weak<Inner>>>> = Lazy::new(|| Mutex::new(Vec::new()));

struct Inner {
    tracer: Tracer,
    propagation: Arc<dyn Propagation>,
    noop: Arc<AtomicBool>,
    closed: AtomicBool,
}

/// A configured tracing instance. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Tracing {
    inner: Arc<Inner>,
}

impl Tracing {
    /// Returns a builder with library defaults: service name `unknown`,
    /// always-sample, system clock, B3 propagation, thread-local scoping,
    /// and a logging reporter.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The most recently built instance that has not been closed, if any.
    pub fn current() -> Option<Tracing> {
        let mut registry = REGISTRY.lock();
        registry.retain(|weak| weak.strong_count() > 0);
        registry
            .iter()
            .rev()
            .filter_map(Weak::upgrade)
            .find(|inner| !inner.closed.load(Ordering::Acquire))
            .map(|inner| Tracing { inner })
    }

    /// The tracer of this instance.
    pub fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    /// The header codec built from the configured propagation factory.
    pub fn propagation(&self) -> &Arc<dyn Propagation> {
        &self.inner.propagation
    }

    /// Globally disables (or re-enables) span recording. While set, every
    /// span-creating entry point yields a no-op span whose context still
    /// carries valid identifiers.
    pub fn set_noop(&self, noop: bool) {
        self.inner.noop.store(noop, Ordering::SeqCst);
    }

    /// Whether recording is globally disabled.
    pub fn is_noop(&self) -> bool {
        self.inner.noop.load(Ordering::SeqCst)
    }

    /// Removes this instance from [`current`](Self::current) resolution.
    /// Idempotent; existing spans keep recording through their tracer.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Tracing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracing")
            .field("noop", &self.is_noop())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Tracing`] instance.
pub struct Builder {
    local_service_name: String,
    local_endpoint: Option<Endpoint>,
    reporter: Option<Box<dyn Reporter>>,
    sampler: Arc<dyn Sampler>,
    clock: Arc<dyn Clock>,
    propagation_factory: Arc<dyn PropagationFactory>,
    current_trace_context: Arc<dyn CurrentTraceContext>,
    trace_id_128bit: bool,
    supports_join: bool,
    finished_span_handlers: Vec<Box<dyn FinishedSpanHandler>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            local_service_name: "unknown".to_string(),
            local_endpoint: None,
            reporter: None,
            sampler: Arc::new(AlwaysSampler),
            clock: Arc::new(SystemClock),
            propagation_factory: Arc::new(B3Propagation),
            current_trace_context: Arc::new(ThreadLocalCurrentTraceContext),
            trace_id_128bit: false,
            supports_join: true,
            finished_span_handlers: Vec::new(),
        }
    }
}

impl Builder {
    /// Names the local endpoint. Ignored when an explicit endpoint is set.
    pub fn with_local_service_name(mut self, name: impl Into<String>) -> Self {
        self.local_service_name = name.into();
        self
    }

    /// Overrides the computed local endpoint for all reported spans.
    pub fn with_local_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.local_endpoint = Some(endpoint);
        self
    }

    /// Sets the sink for finished spans.
    pub fn with_span_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Sets the sampling predicate consulted for undecided traces.
    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Arc::new(sampler);
        self
    }

    /// Sets the timestamp source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets the wire codec factory. Its join capability and trace id width
    /// requirements combine with the explicit settings below.
    pub fn with_propagation_factory(
        mut self,
        factory: impl PropagationFactory + 'static,
    ) -> Self {
        self.propagation_factory = Arc::new(factory);
        self
    }

    /// Sets the scope manager implementation.
    pub fn with_current_trace_context(
        mut self,
        current: impl CurrentTraceContext + 'static,
    ) -> Self {
        self.current_trace_context = Arc::new(current);
        self
    }

    /// Generates 128-bit trace ids for new traces.
    pub fn with_trace_id_128bit(mut self, trace_id_128bit: bool) -> Self {
        self.trace_id_128bit = trace_id_128bit;
        self
    }

    /// Overrides the factory's join capability. `false` forces joins to
    /// degrade into children.
    pub fn with_supports_join(mut self, supports_join: bool) -> Self {
        self.supports_join = supports_join;
        self
    }

    /// Appends a post-finish interceptor, applied before the reporter in
    /// registration order.
    pub fn with_finished_span_handler(
        mut self,
        handler: impl FinishedSpanHandler + 'static,
    ) -> Self {
        self.finished_span_handlers.push(Box::new(handler));
        self
    }

    /// Builds and registers the instance.
    pub fn build(self) -> Tracing {
        let local_endpoint = self
            .local_endpoint
            .unwrap_or_else(|| Endpoint::new(self.local_service_name));
        let reporter = self
            .reporter
            .unwrap_or_else(|| Box::new(LoggingReporter));
        let recorder = Arc::new(Recorder::new(
            local_endpoint,
            reporter,
            self.finished_span_handlers,
            Arc::clone(&self.clock),
        ));
        let noop = Arc::new(AtomicBool::new(false));
        let supports_join = self.supports_join && self.propagation_factory.supports_join();
        let trace_id_128bit =
            self.trace_id_128bit || self.propagation_factory.requires_128bit_trace_id();
        let tracer = Tracer::new(
            self.sampler,
            self.current_trace_context,
            recorder,
            trace_id_128bit,
            supports_join,
            Arc::clone(&noop),
        );
        let inner = Arc::new(Inner {
            tracer,
            propagation: self.propagation_factory.create(),
            noop,
            closed: AtomicBool::new(false),
        });
        REGISTRY.lock().push(Arc::downgrade(&inner));
        Tracing { inner }
    }
}
