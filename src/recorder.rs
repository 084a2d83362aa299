//! In-flight span recording.
//!
//! The recorder owns the table of spans that have been started (or otherwise
//! mutated) but not yet finished. Entries are keyed by the identifier triple,
//! so repeated lifts of the same context converge on one record. Fields of a
//! record are guarded by a lightweight mutex; the map itself is a concurrent
//! map, so no global lock is held across user mutations.
//!
//! Finishing removes the entry atomically (a second finish is a no-op),
//! converts it into the reporter's input shape with the configured local
//! endpoint stamped on, runs the finished-span handler chain, and then calls
//! the reporter. The reporter runs after all map and record locks are
//! released, and panics from it are caught, logged, and discarded.

use crate::clock::Clock;
use crate::context::TraceContext;
use crate::endpoint::Endpoint;
use crate::reporter::{Annotation, FinishedSpan, FinishedSpanHandler, Kind, Reporter};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Identifier triple keying the in-flight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SpanKey {
    trace_id_high: u64,
    trace_id: u64,
    span_id: u64,
}

impl From<&TraceContext> for SpanKey {
    fn from(context: &TraceContext) -> Self {
        Self {
            trace_id_high: context.trace_id_high(),
            trace_id: context.trace_id(),
            span_id: context.span_id(),
        }
    }
}

/// Mutable accumulator for one span between start and finish.
#[derive(Debug, Default, Clone)]
pub(crate) struct MutableSpan {
    pub(crate) name: Option<String>,
    pub(crate) kind: Option<Kind>,
    pub(crate) start_timestamp: Option<u64>,
    pub(crate) finish_timestamp: Option<u64>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) tags: IndexMap<String, String>,
    pub(crate) remote_endpoint: Option<Endpoint>,
    pub(crate) error: Option<String>,
}

/// One in-flight entry: the context it was created under plus its record.
struct SpanRecord {
    context: TraceContext,
    data: Mutex<MutableSpan>,
}

/// The in-flight span table and the finish pipeline behind it.
pub(crate) struct Recorder {
    spans: DashMap<SpanKey, Arc<SpanRecord>>,
    local_endpoint: Endpoint,
    reporter: Box<dyn Reporter>,
    handlers: Vec<Box<dyn FinishedSpanHandler>>,
    clock: Arc<dyn Clock>,
}

impl Recorder {
    pub(crate) fn new(
        local_endpoint: Endpoint,
        reporter: Box<dyn Reporter>,
        handlers: Vec<Box<dyn FinishedSpanHandler>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            spans: DashMap::new(),
            local_endpoint,
            reporter,
            handlers,
            clock,
        }
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn reporter(&self) -> &dyn Reporter {
        &*self.reporter
    }

    /// Applies `f` to the record for `context`, creating it if absent.
    ///
    /// Concurrent callers with equal keys see the same record.
    pub(crate) fn with_span<F>(&self, context: &TraceContext, f: F)
    where
        F: FnOnce(&mut MutableSpan),
    {
        let record = self
            .spans
            .entry(SpanKey::from(context))
            .or_insert_with(|| {
                Arc::new(SpanRecord {
                    context: context.clone(),
                    data: Mutex::new(MutableSpan::default()),
                })
            })
            .clone();
        f(&mut record.data.lock());
    }

    /// Finishes the span for `context`, stamping `finish_timestamp` and
    /// reporting. A second call for the same key is a no-op.
    pub(crate) fn finish(&self, context: &TraceContext, finish_timestamp: u64) {
        if let Some((_, record)) = self.spans.remove(&SpanKey::from(context)) {
            let mut data = std::mem::take(&mut *record.data.lock());
            data.finish_timestamp = Some(finish_timestamp);
            let span = self.convert(&record.context, &data);
            self.report(span);
        }
    }

    /// Reports the span for `context` in its current state, without a
    /// duration. The entry is removed; a later finish is a no-op.
    pub(crate) fn flush(&self, context: &TraceContext) {
        if let Some((_, record)) = self.spans.remove(&SpanKey::from(context)) {
            let data = std::mem::take(&mut *record.data.lock());
            let span = self.convert(&record.context, &data);
            self.report(span);
        }
    }

    /// Drops the entry for `context` without reporting.
    pub(crate) fn abandon(&self, context: &TraceContext) {
        self.spans.remove(&SpanKey::from(context));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Snapshots all in-flight spans in key order, for diagnostics.
    pub(crate) fn snapshot(&self) -> Vec<FinishedSpan> {
        let mut entries: Vec<Arc<SpanRecord>> =
            self.spans.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|r| SpanKey::from(&r.context));
        entries
            .iter()
            .map(|r| {
                let data = r.data.lock().clone();
                self.convert(&r.context, &data)
            })
            .collect()
    }

    /// Total conversion into the reporter's input shape.
    fn convert(&self, context: &TraceContext, data: &MutableSpan) -> FinishedSpan {
        let duration = match (data.start_timestamp, data.finish_timestamp) {
            (Some(start), Some(finish)) => Some(finish.saturating_sub(start)),
            _ => None,
        };
        let mut tags = data.tags.clone();
        if let Some(error) = &data.error {
            // An explicit error tag wins over the recorded error message.
            if !tags.contains_key("error") {
                tags.insert("error".to_string(), error.clone());
            }
        }
        FinishedSpan {
            trace_id: context.trace_id_string(),
            parent_id: context.parent_id().map(|id| format!("{id:016x}")),
            id: context.span_id_string(),
            kind: data.kind,
            name: data.name.clone(),
            timestamp: data.start_timestamp,
            duration,
            local_endpoint: Some(self.local_endpoint.clone()),
            remote_endpoint: data.remote_endpoint.clone(),
            annotations: data.annotations.clone(),
            tags,
            shared: context.shared(),
            debug: context.debug(),
        }
    }

    /// Runs the handler chain and hands the result to the reporter, outside
    /// of any map or record lock.
    fn report(&self, mut span: FinishedSpan) {
        for handler in &self.handlers {
            if !handler.handle(&mut span) {
                return;
            }
        }
        if catch_unwind(AssertUnwindSafe(|| self.reporter.report(span))).is_err() {
            tracing::error!("span reporter panicked; the span was discarded");
        }
    }
}

impl Ord for SpanKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.trace_id_high, self.trace_id, self.span_id).cmp(&(
            other.trace_id_high,
            other.trace_id,
            other.span_id,
        ))
    }
}

impl PartialOrd for SpanKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
