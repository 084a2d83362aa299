//! B3 multi-header codec.
//!
//! The conventional header set for this span model: one header per field,
//! identifiers as fixed-width lowercase hex. Because the format carries the
//! caller's span id itself, a server can join the client's span rather than
//! parent a new one under it.

use crate::context::{
    parse_span_id_hex, parse_trace_id_hex, SamplingFlags, TraceContext, TraceContextOrFlags,
    TraceIdContext,
};
use crate::propagation::{Extractor, Injector, Propagation, PropagationFactory};
use std::sync::Arc;

const TRACE_ID: &str = "X-B3-TraceId";
const SPAN_ID: &str = "X-B3-SpanId";
const PARENT_SPAN_ID: &str = "X-B3-ParentSpanId";
const SAMPLED: &str = "X-B3-Sampled";
const FLAGS: &str = "X-B3-Flags";

const KEYS: &[&str] = &[TRACE_ID, SPAN_ID, PARENT_SPAN_ID, SAMPLED, FLAGS];

/// B3 multi-header propagation. Doubles as its own factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct B3Propagation;

impl Propagation for B3Propagation {
    fn keys(&self) -> &[&'static str] {
        KEYS
    }

    fn inject(&self, context: &TraceContext, carrier: &mut dyn Injector) {
        carrier.set(TRACE_ID, context.trace_id_string());
        carrier.set(SPAN_ID, context.span_id_string());
        if let Some(parent_id) = context.parent_id() {
            carrier.set(PARENT_SPAN_ID, format!("{parent_id:016x}"));
        }
        if context.debug() {
            carrier.set(FLAGS, "1".to_string());
        } else if let Some(sampled) = context.sampled() {
            carrier.set(SAMPLED, if sampled { "1" } else { "0" }.to_string());
        }
    }

    fn extract(&self, carrier: &dyn Extractor) -> TraceContextOrFlags {
        let flags = extract_flags(carrier);

        let trace_id = match carrier.get(TRACE_ID) {
            Some(value) => match parse_trace_id_hex(value) {
                Ok(halves) => halves,
                Err(_) => return TraceContextOrFlags::empty(),
            },
            // No identifiers: the sampling decision still propagates.
            None => return TraceContextOrFlags::from_flags(flags),
        };

        let span_id = match carrier.get(SPAN_ID) {
            Some(value) => match parse_span_id_hex("span id", value) {
                Ok(id) => id,
                Err(_) => return TraceContextOrFlags::empty(),
            },
            // Partial instrumentation upstream: keep the trace id, mint the
            // span id locally.
            None => {
                return TraceContextOrFlags::from_trace_id(TraceIdContext {
                    trace_id_high: trace_id.0,
                    trace_id: trace_id.1,
                    flags,
                });
            }
        };

        let parent_id = match carrier.get(PARENT_SPAN_ID) {
            Some(value) => match parse_span_id_hex("parent id", value) {
                Ok(id) => Some(id),
                Err(_) => return TraceContextOrFlags::empty(),
            },
            None => None,
        };

        let context = TraceContext::builder()
            .trace_id_high(trace_id.0)
            .trace_id(trace_id.1)
            .span_id(span_id)
            .parent_id(parent_id)
            .sampling_flags(flags)
            .build();
        match context {
            Ok(context) => TraceContextOrFlags::from_context(context),
            Err(_) => TraceContextOrFlags::empty(),
        }
    }
}

fn extract_flags(carrier: &dyn Extractor) -> SamplingFlags {
    if carrier.get(FLAGS) == Some("1") {
        return SamplingFlags::DEBUG;
    }
    match carrier.get(SAMPLED) {
        Some("1") | Some("true") => SamplingFlags::SAMPLED,
        Some("0") | Some("false") => SamplingFlags::NOT_SAMPLED,
        _ => SamplingFlags::EMPTY,
    }
}

impl PropagationFactory for B3Propagation {
    fn create(&self) -> Arc<dyn Propagation> {
        Arc::new(B3Propagation)
    }

    fn supports_join(&self) -> bool {
        true
    }
}
