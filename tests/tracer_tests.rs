//! Tracer behavior tests: span creation decision tables, sticky sampling,
//! the noop toggle, and the diagnostic display contract.

use pretty_assertions::assert_eq as assert_str_eq;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracewire::prelude::*;

// ============================================================================
// Test fixtures
// ============================================================================

/// Captures reported spans; displays as `MyReporter{}`.
#[derive(Clone, Default)]
struct MyReporter {
    spans: Arc<parking_lot::Mutex<Vec<FinishedSpan>>>,
}

impl MyReporter {
    fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().clone()
    }

    fn only_span(&self) -> FinishedSpan {
        let spans = self.spans();
        assert_eq!(spans.len(), 1, "expected exactly one reported span");
        spans.into_iter().next().unwrap()
    }
}

impl Reporter for MyReporter {
    fn report(&self, span: FinishedSpan) {
        self.spans.lock().push(span);
    }
}

impl fmt::Display for MyReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MyReporter{}")
    }
}

/// Counts how often the tracer consults it; always samples.
#[derive(Clone, Default)]
struct CountingSampler {
    calls: Arc<AtomicUsize>,
}

impl Sampler for CountingSampler {
    fn is_sampled(&self, _trace_id: u64) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

struct PanickingSampler;

impl Sampler for PanickingSampler {
    fn is_sampled(&self, _trace_id: u64) -> bool {
        panic!("sampler configuration bug");
    }
}

fn tracing_with(reporter: MyReporter) -> Tracing {
    Tracing::builder()
        .with_local_service_name("my-service")
        .with_span_reporter(reporter)
        .with_clock(TickClock::starting_at(1))
        .build()
}

fn context(trace_id: u64, span_id: u64) -> TraceContext {
    TraceContext::builder()
        .trace_id(trace_id)
        .span_id(span_id)
        .sampled(true)
        .build()
        .unwrap()
}

// ============================================================================
// Root spans
// ============================================================================

#[test]
fn test_new_trace_has_valid_sampled_context() {
    let tracing = tracing_with(MyReporter::default());
    let span = tracing.tracer().new_trace();
    let ctx = span.context();
    assert!(!span.is_noop());
    assert_ne!(ctx.trace_id(), 0);
    assert_ne!(ctx.span_id(), 0);
    assert_eq!(ctx.parent_id(), None);
    assert_eq!(ctx.sampled(), Some(true));
    assert!(!ctx.shared());
    tracing.close();
}

#[test]
fn test_new_trace_not_sampled_is_noop_with_valid_ids() {
    let tracing = Tracing::builder()
        .with_sampler(NeverSampler)
        .with_span_reporter(MyReporter::default())
        .build();
    let span = tracing.tracer().new_trace();
    assert!(span.is_noop());
    assert_ne!(span.context().trace_id(), 0);
    assert_eq!(span.context().sampled(), Some(false));
    tracing.close();
}

#[test]
fn test_new_trace_with_explicit_flags() {
    let tracing = Tracing::builder()
        .with_sampler(NeverSampler)
        .with_span_reporter(MyReporter::default())
        .build();
    let tracer = tracing.tracer();

    // explicit decisions bypass the sampler entirely
    assert!(tracer.new_trace_with(SamplingFlags::NOT_SAMPLED).is_noop());
    assert!(!tracer.new_trace_with(SamplingFlags::SAMPLED).is_noop());

    let debug = tracer.new_trace_with(SamplingFlags::DEBUG);
    assert!(!debug.is_noop());
    assert!(debug.context().debug());
    assert_eq!(debug.context().sampled(), Some(true));

    // empty flags fall back to the sampler
    assert!(tracer.new_trace_with(SamplingFlags::EMPTY).is_noop());
    tracing.close();
}

#[test]
fn test_128_bit_trace_ids() {
    let tracing = Tracing::builder()
        .with_trace_id_128bit(true)
        .with_span_reporter(MyReporter::default())
        .build();
    let ctx = tracing.tracer().new_trace().context().clone();
    assert_ne!(ctx.trace_id_high(), 0);
    assert_ne!(ctx.trace_id(), 0);
    assert_eq!(ctx.trace_id_string().len(), 32);
    tracing.close();
}

#[test]
fn test_panicking_sampler_means_not_sampled() {
    let tracing = Tracing::builder()
        .with_sampler(PanickingSampler)
        .with_span_reporter(MyReporter::default())
        .build();
    let span = tracing.tracer().new_trace();
    assert!(span.is_noop());
    assert_eq!(span.context().sampled(), Some(false));
    tracing.close();
}

// ============================================================================
// Joins (S1, S2, S3)
// ============================================================================

#[test]
fn test_join_sets_shared() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let tracer = tracing.tracer();

    let c = tracer.new_trace().context().clone();
    tracer.join_span(&c).start().finish();

    let span = reporter.only_span();
    assert!(span.shared);
    assert_eq!(span.trace_id, c.trace_id_string());
    assert_eq!(span.id, c.span_id_string());
    tracing.close();
}

#[test]
fn test_join_degrades_to_child_when_unsupported() {
    let reporter = MyReporter::default();
    let tracing = Tracing::builder()
        .with_local_service_name("my-service")
        .with_span_reporter(reporter.clone())
        .with_supports_join(false)
        .build();
    let tracer = tracing.tracer();

    let c = tracer.new_trace().context().clone();
    tracer.join_span(&c).start().finish();

    let span = reporter.only_span();
    assert!(!span.shared);
    assert_eq!(span.parent_id.as_deref(), Some(c.span_id_string().as_str()));
    assert_ne!(span.id, c.span_id_string());
    tracing.close();
}

#[test]
fn test_join_resolves_undecided_sampling() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();

    let c = tracer
        .new_trace()
        .context()
        .to_builder()
        .sampled_undecided()
        .build()
        .unwrap();
    assert_eq!(c.sampled(), None);

    let joined = tracer.join_span(&c);
    assert_eq!(joined.context().sampled(), Some(true));
    assert!(joined.context().shared());
    tracing.close();
}

// ============================================================================
// Children
// ============================================================================

#[test]
fn test_new_child_links_and_allocates() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();

    let parent = tracer.new_trace().context().clone();
    let child = tracer.new_child(&parent);
    let ctx = child.context();
    assert_eq!(ctx.trace_id(), parent.trace_id());
    assert_eq!(ctx.parent_id(), Some(parent.span_id()));
    assert_ne!(ctx.span_id(), parent.span_id());
    assert!(!ctx.shared());
    tracing.close();
}

#[test]
fn test_new_child_of_unsampled_parent_is_noop() {
    let tracing = tracing_with(MyReporter::default());
    let parent = context(1, 10).to_builder().sampled(false).build().unwrap();
    assert!(tracing.tracer().new_child(&parent).is_noop());
    tracing.close();
}

#[test]
fn test_child_inherits_debug_and_extra() {
    let tracing = tracing_with(MyReporter::default());
    let parent = TraceContext::builder()
        .trace_id(1)
        .span_id(10)
        .debug(true)
        .push_extra(Arc::new(41i32))
        .build()
        .unwrap();
    let child = tracing.tracer().new_child(&parent);
    assert!(child.context().debug());
    let values: Vec<i32> = child
        .context()
        .extra()
        .iter()
        .map(|e| *e.downcast_ref::<i32>().unwrap())
        .collect();
    assert_eq!(values, vec![41]);
    tracing.close();
}

#[test]
fn test_sampler_consulted_once_per_trace() {
    let sampler = CountingSampler::default();
    let tracing = Tracing::builder()
        .with_sampler(sampler.clone())
        .with_span_reporter(MyReporter::default())
        .build();
    let tracer = tracing.tracer();

    let root = tracer.new_trace();
    let child = tracer.new_child(root.context());
    let _grandchild = tracer.new_child(child.context());
    let _joined = tracer.join_span(child.context());

    assert_eq!(sampler.calls.load(Ordering::SeqCst), 1);
    tracing.close();
}

// ============================================================================
// next_span dispatch
// ============================================================================

#[test]
fn test_next_span_with_full_context_joins() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();
    let c = tracer.new_trace().context().clone();
    let next = tracer.next_span_with(TraceContextOrFlags::from_context(c.clone()));
    assert_eq!(next.context().span_id(), c.span_id());
    assert!(next.context().shared());
    tracing.close();
}

#[test]
fn test_next_span_with_trace_id_mints_span_id() {
    let tracing = tracing_with(MyReporter::default());
    let next = tracing
        .tracer()
        .next_span_with(TraceContextOrFlags::from_trace_id(TraceIdContext {
            trace_id_high: 0,
            trace_id: 7,
            flags: SamplingFlags::EMPTY,
        }));
    let ctx = next.context();
    assert_eq!(ctx.trace_id(), 7);
    assert_ne!(ctx.span_id(), 0);
    assert_eq!(ctx.sampled(), Some(true));
    assert!(!ctx.shared());
    tracing.close();
}

#[test]
fn test_next_span_with_flags_and_current_childs() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();
    let parent = tracer.new_trace();
    let _scope = tracer.with_span_in_scope(Some(&parent));

    let next = tracer.next_span_with(TraceContextOrFlags::from_flags(SamplingFlags::SAMPLED));
    assert_eq!(next.context().trace_id(), parent.context().trace_id());
    assert_eq!(next.context().parent_id(), Some(parent.context().span_id()));
    tracing.close();
}

#[test]
fn test_next_span_with_flags_overlays_decision() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();
    let parent = tracer.new_trace();
    let _scope = tracer.with_span_in_scope(Some(&parent));

    let next = tracer.next_span_with(TraceContextOrFlags::from_flags(SamplingFlags::NOT_SAMPLED));
    assert!(next.is_noop());
    assert_eq!(next.context().sampled(), Some(false));
    tracing.close();
}

#[test]
fn test_next_span_without_current_starts_trace() {
    let tracing = tracing_with(MyReporter::default());
    let next = tracing.tracer().next_span();
    assert_eq!(next.context().parent_id(), None);
    assert_eq!(next.context().sampled(), Some(true));
    tracing.close();
}

#[test]
fn test_next_span_appends_extracted_extra() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();

    let parent = TraceContext::builder()
        .trace_id(1)
        .span_id(10)
        .sampled(true)
        .push_extra(Arc::new(1i32))
        .build()
        .unwrap();
    let parent_span = tracer.to_span(&parent);
    let _scope = tracer.with_span_in_scope(Some(&parent_span));

    let extracted = TraceContextOrFlags::empty().push_extra(Arc::new(2i32));
    let next = tracer.next_span_with(extracted);
    let values: Vec<i32> = next
        .context()
        .extra()
        .iter()
        .map(|e| *e.downcast_ref::<i32>().unwrap())
        .collect();
    assert_eq!(values, vec![1, 2]);
    tracing.close();
}

// ============================================================================
// to_span and the current span
// ============================================================================

#[test]
fn test_to_span_of_unsampled_context_is_noop() {
    let tracing = tracing_with(MyReporter::default());
    let ctx = context(1, 10).to_builder().sampled(false).build().unwrap();
    assert!(tracing.tracer().to_span(&ctx).is_noop());
    tracing.close();
}

#[test]
fn test_to_span_is_idempotent_per_context() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let tracer = tracing.tracer();
    let ctx = context(1, 10);

    let first = tracer.to_span(&ctx);
    let second = tracer.to_span(&ctx);
    first.start_with_timestamp(1);
    first.tag("a", "1");
    second.tag("b", "2");
    second.finish_with_timestamp(3);

    let span = reporter.only_span();
    assert_eq!(span.tags.get("a").map(String::as_str), Some("1"));
    assert_eq!(span.tags.get("b").map(String::as_str), Some("2"));
    assert_eq!(span.duration, Some(2));
    tracing.close();
}

#[test]
fn test_current_span_lifts_scope_top() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();
    assert!(tracer.current_span().is_none());

    let span = tracer.new_trace();
    {
        let _scope = tracer.with_span_in_scope(Some(&span));
        let current = tracer.current_span().unwrap();
        assert_eq!(current.context(), span.context());
        {
            let _cleared = tracer.with_span_in_scope(None);
            assert!(tracer.current_span().is_none());
        }
        assert!(tracer.current_span().is_some());
    }
    assert!(tracer.current_span().is_none());
    tracing.close();
}

// ============================================================================
// Noop toggle
// ============================================================================

#[test]
fn test_set_noop_disables_all_entry_points() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let tracer = tracing.tracer();
    let existing = tracer.new_trace().context().clone();

    tracing.set_noop(true);
    let spans = [
        tracer.new_trace(),
        tracer.new_trace_with(SamplingFlags::DEBUG),
        tracer.join_span(&existing),
        tracer.new_child(&existing),
        tracer.next_span(),
        tracer.to_span(&existing),
    ];
    for span in &spans {
        assert!(span.is_noop());
        assert_ne!(span.context().trace_id(), 0);
        assert_ne!(span.context().span_id(), 0);
    }

    spans[0].start().finish();
    assert!(reporter.spans().is_empty());

    tracing.set_noop(false);
    assert!(!tracer.new_trace().is_noop());
    tracing.close();
}

// ============================================================================
// Display contract (S4, S5, S6)
// ============================================================================

#[test]
fn test_display_with_current_span() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();
    let span = tracer.to_span(&context(1, 10));
    let _scope = tracer.with_span_in_scope(Some(&span));
    assert_str_eq!(
        tracer.to_string(),
        "Tracer{currentSpan=0000000000000001/000000000000000a, reporter=MyReporter{}}"
    );
    tracing.close();
}

#[test]
fn test_display_with_in_flight_span() {
    let tracing = tracing_with(MyReporter::default());
    let tracer = tracing.tracer();
    let span = tracer.to_span(&context(1, 10));
    span.start_with_timestamp(1);
    assert_str_eq!(
        tracer.to_string(),
        "Tracer{inFlight=[{\"traceId\":\"0000000000000001\",\"id\":\"000000000000000a\",\"timestamp\":1,\"localEndpoint\":{\"serviceName\":\"my-service\"}}], reporter=MyReporter{}}"
    );
    span.finish();
    assert_str_eq!(tracer.to_string(), "Tracer{reporter=MyReporter{}}");
    tracing.close();
}

#[test]
fn test_display_when_noop() {
    let tracing = tracing_with(MyReporter::default());
    tracing.set_noop(true);
    assert_str_eq!(
        tracing.tracer().to_string(),
        "Tracer{noop=true, reporter=MyReporter{}}"
    );
    tracing.close();
}

// ============================================================================
// Span recording through the pipeline
// ============================================================================

#[test]
fn test_full_span_lifecycle_reports_all_fields() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let tracer = tracing.tracer();

    let span = tracer.new_trace();
    span.name("get /users")
        .kind(Kind::Server)
        .tag("http.path", "/users")
        .remote_endpoint(Endpoint::new("frontend"))
        .start_with_timestamp(100);
    span.annotate_at(150, "ws");
    span.error("timeout");
    span.finish_with_timestamp(300);

    let reported = reporter.only_span();
    assert_eq!(reported.name.as_deref(), Some("get /users"));
    assert_eq!(reported.kind, Some(Kind::Server));
    assert_eq!(reported.timestamp, Some(100));
    assert_eq!(reported.duration, Some(200));
    assert_eq!(
        reported.local_endpoint.as_ref().unwrap().service_name.as_deref(),
        Some("my-service")
    );
    assert_eq!(
        reported.remote_endpoint.as_ref().unwrap().service_name.as_deref(),
        Some("frontend")
    );
    assert_eq!(reported.annotations.len(), 1);
    assert_eq!(reported.tags.get("error").map(String::as_str), Some("timeout"));
    tracing.close();
}

#[test]
fn test_finish_twice_reports_once() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let span = tracing.tracer().new_trace();
    span.start_with_timestamp(1);
    span.finish_with_timestamp(2);
    span.finish_with_timestamp(9);
    assert_eq!(reporter.spans().len(), 1);
    tracing.close();
}

#[test]
fn test_abandon_reports_nothing() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let span = tracing.tracer().new_trace();
    span.start();
    span.abandon();
    span.finish();
    assert!(reporter.spans().is_empty());
    tracing.close();
}

#[test]
fn test_flush_reports_without_duration() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let span = tracing.tracer().new_trace();
    span.start_with_timestamp(5);
    span.flush();
    let reported = reporter.only_span();
    assert_eq!(reported.timestamp, Some(5));
    assert_eq!(reported.duration, None);
    tracing.close();
}

#[test]
fn test_finished_span_handler_rewrites_before_reporter() {
    struct Redact;
    impl FinishedSpanHandler for Redact {
        fn handle(&self, span: &mut FinishedSpan) -> bool {
            span.tags.shift_remove("secret");
            true
        }
    }

    let reporter = MyReporter::default();
    let tracing = Tracing::builder()
        .with_local_service_name("my-service")
        .with_span_reporter(reporter.clone())
        .with_finished_span_handler(Redact)
        .build();
    let span = tracing.tracer().new_trace();
    span.tag("secret", "hunter2").tag("kept", "yes").start();
    span.finish();

    let reported = reporter.only_span();
    assert!(reported.tags.get("secret").is_none());
    assert_eq!(reported.tags.get("kept").map(String::as_str), Some("yes"));
    tracing.close();
}

#[test]
fn test_cross_thread_mutation_of_one_span() {
    let reporter = MyReporter::default();
    let tracing = tracing_with(reporter.clone());
    let tracer = tracing.tracer().clone();

    let span = tracer.new_trace();
    span.start_with_timestamp(1);
    let ctx = span.context().clone();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let tracer = tracer.clone();
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                tracer.to_span(&ctx).tag(&format!("worker.{i}"), "done");
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    span.finish_with_timestamp(2);

    let reported = reporter.only_span();
    assert_eq!(reported.tags.len(), 4);
    tracing.close();
}
