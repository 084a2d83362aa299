//! Trace contexts and sampling flags.
//!
//! A [`TraceContext`] is the immutable identifier tuple that links spans into
//! a trace, carried in-process and across service boundaries. It pairs the
//! trace and span ids with the sampling decision and with `extra`, an ordered
//! sequence of opaque payloads that propagation plugins attach per trace.
//!
//! Inbound context is frequently partial: a peer may send ids without a
//! sampling decision, a decision without ids, or nothing at all.
//! [`TraceContextOrFlags`] models exactly one of those shapes and feeds the
//! tracer's dispatch logic.

use crate::error::{Error, Result};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An opaque propagation payload attached to a trace context.
///
/// Payloads are immutable once attached and are shared by reference when a
/// context is extended or a child is created. Order is append order.
pub type Extra = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Sampling flags
// ============================================================================

/// The sampling decision carried on the wire: a tri-state `sampled` plus a
/// `debug` override.
///
/// `debug` forces reporting regardless of configured sampling, so a debug
/// context always reads as sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplingFlags {
    sampled: Option<bool>,
    debug: bool,
}

impl SamplingFlags {
    /// No decision yet: the receiving service must decide.
    pub const EMPTY: SamplingFlags = SamplingFlags {
        sampled: None,
        debug: false,
    };

    /// Record this trace.
    pub const SAMPLED: SamplingFlags = SamplingFlags {
        sampled: Some(true),
        debug: false,
    };

    /// Do not record this trace.
    pub const NOT_SAMPLED: SamplingFlags = SamplingFlags {
        sampled: Some(false),
        debug: false,
    };

    /// Record this trace regardless of sampling configuration.
    pub const DEBUG: SamplingFlags = SamplingFlags {
        sampled: Some(true),
        debug: true,
    };

    /// Builds flags from a raw tri-state decision.
    pub fn new(sampled: Option<bool>) -> Self {
        Self {
            sampled,
            debug: false,
        }
    }

    /// The sampling decision, if one has been made.
    ///
    /// Debug implies sampled.
    pub fn sampled(&self) -> Option<bool> {
        if self.debug {
            Some(true)
        } else {
            self.sampled
        }
    }

    /// Whether this trace is forcibly recorded.
    pub fn debug(&self) -> bool {
        self.debug
    }
}

// ============================================================================
// Trace context
// ============================================================================

/// The immutable identifier record linking a span to its trace.
///
/// Equality and hashing cover the identifiers and sampling/debug flags only:
/// `shared` and `extra` are local bookkeeping, not identity.
#[derive(Debug, Clone)]
pub struct TraceContext {
    trace_id_high: u64,
    trace_id: u64,
    parent_id: Option<u64>,
    span_id: u64,
    flags: SamplingFlags,
    shared: bool,
    extra: Vec<Extra>,
}

impl TraceContext {
    /// Returns a builder used to construct a `TraceContext`.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// High 64 bits of the trace id, zero in 64-bit mode.
    pub fn trace_id_high(&self) -> u64 {
        self.trace_id_high
    }

    /// Low 64 bits of the trace id, never zero.
    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// The parent span id, or `None` for a root span.
    pub fn parent_id(&self) -> Option<u64> {
        self.parent_id
    }

    /// The span id, never zero.
    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    /// The sampling flags carried by this context.
    pub fn sampling_flags(&self) -> SamplingFlags {
        self.flags
    }

    /// The sampling decision, if one has been made. Debug implies sampled.
    pub fn sampled(&self) -> Option<bool> {
        self.flags.sampled()
    }

    /// Whether this trace is forcibly recorded.
    pub fn debug(&self) -> bool {
        self.flags.debug()
    }

    /// Whether this span id was taken over from a caller on the wire.
    ///
    /// Only a join produces a shared context; children never do.
    pub fn shared(&self) -> bool {
        self.shared
    }

    /// Propagation payloads attached to this trace, in append order.
    pub fn extra(&self) -> &[Extra] {
        &self.extra
    }

    /// The trace id as fixed-width lowercase hex: 32 characters when the
    /// high half is set, 16 otherwise.
    pub fn trace_id_string(&self) -> String {
        if self.trace_id_high != 0 {
            format!("{:016x}{:016x}", self.trace_id_high, self.trace_id)
        } else {
            format!("{:016x}", self.trace_id)
        }
    }

    /// The span id as 16 lowercase hex characters.
    pub fn span_id_string(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// Returns a builder seeded with this context's fields.
    pub fn to_builder(&self) -> Builder {
        Builder {
            trace_id_high: self.trace_id_high,
            trace_id: self.trace_id,
            parent_id: self.parent_id,
            span_id: self.span_id,
            sampled: self.flags.sampled,
            debug: self.flags.debug,
            shared: self.shared,
            extra: self.extra.clone(),
        }
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.trace_id_string(), self.span_id_string())
    }
}

impl PartialEq for TraceContext {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id_high == other.trace_id_high
            && self.trace_id == other.trace_id
            && self.parent_id == other.parent_id
            && self.span_id == other.span_id
            && self.flags.sampled == other.flags.sampled
            && self.flags.debug == other.flags.debug
    }
}

impl Eq for TraceContext {}

impl Hash for TraceContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trace_id_high.hash(state);
        self.trace_id.hash(state);
        self.parent_id.hash(state);
        self.span_id.hash(state);
        self.flags.sampled.hash(state);
        self.flags.debug.hash(state);
    }
}

/// A builder for [`TraceContext`].
#[derive(Default, Clone)]
pub struct Builder {
    trace_id_high: u64,
    trace_id: u64,
    parent_id: Option<u64>,
    span_id: u64,
    sampled: Option<bool>,
    debug: bool,
    shared: bool,
    extra: Vec<Extra>,
}

impl Builder {
    /// Sets the high 64 bits of the trace id. Zero means 64-bit mode.
    pub fn trace_id_high(mut self, trace_id_high: u64) -> Self {
        self.trace_id_high = trace_id_high;
        self
    }

    /// Sets the low 64 bits of the trace id. Must be nonzero.
    pub fn trace_id(mut self, trace_id: u64) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Sets the parent span id. Defaults to `None` (a root span).
    pub fn parent_id(mut self, parent_id: Option<u64>) -> Self {
        self.parent_id = parent_id.filter(|id| *id != 0);
        self
    }

    /// Sets the span id. Must be nonzero.
    pub fn span_id(mut self, span_id: u64) -> Self {
        self.span_id = span_id;
        self
    }

    /// Replaces the sampling flags wholesale.
    pub fn sampling_flags(mut self, flags: SamplingFlags) -> Self {
        self.sampled = flags.sampled;
        self.debug = flags.debug;
        self
    }

    /// Sets the sampling decision.
    pub fn sampled(mut self, sampled: bool) -> Self {
        self.sampled = Some(sampled);
        self
    }

    /// Clears the sampling decision back to undecided.
    pub fn sampled_undecided(mut self) -> Self {
        self.sampled = None;
        self
    }

    /// Sets the debug flag. Debug implies sampled.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Marks the span id as taken over from the caller.
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Appends a propagation payload.
    pub fn push_extra(mut self, extra: Extra) -> Self {
        self.extra.push(extra);
        self
    }

    /// Appends all payloads from `extra`, preserving order.
    pub fn extend_extra(mut self, extra: impl IntoIterator<Item = Extra>) -> Self {
        self.extra.extend(extra);
        self
    }

    /// Constructs a context whose ids are already known to be nonzero.
    ///
    /// Only for internal call sites that mint or copy validated ids.
    pub(crate) fn build_internal(self) -> TraceContext {
        debug_assert!(self.trace_id != 0 && self.span_id != 0);
        TraceContext {
            trace_id_high: self.trace_id_high,
            trace_id: self.trace_id,
            parent_id: self.parent_id,
            span_id: self.span_id,
            flags: SamplingFlags {
                sampled: if self.debug { Some(true) } else { self.sampled },
                debug: self.debug,
            },
            shared: self.shared,
            extra: self.extra,
        }
    }

    /// Constructs the context, validating that both ids are nonzero.
    pub fn build(self) -> Result<TraceContext> {
        if self.trace_id == 0 {
            return Err(Error::InvalidTraceId);
        }
        if self.span_id == 0 {
            return Err(Error::InvalidSpanId);
        }
        Ok(TraceContext {
            trace_id_high: self.trace_id_high,
            trace_id: self.trace_id,
            parent_id: self.parent_id,
            span_id: self.span_id,
            flags: SamplingFlags {
                sampled: if self.debug { Some(true) } else { self.sampled },
                debug: self.debug,
            },
            shared: self.shared,
            extra: self.extra,
        })
    }
}

// ============================================================================
// Partial context shapes
// ============================================================================

/// A trace id with a sampling decision but no span id.
///
/// Produced by codecs whose wire format carries the trace id without the
/// caller's span id; the receiving tracer mints a fresh span id under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceIdContext {
    /// High 64 bits of the trace id, zero in 64-bit mode.
    pub trace_id_high: u64,
    /// Low 64 bits of the trace id, nonzero.
    pub trace_id: u64,
    /// Sampling flags carried alongside the id.
    pub flags: SamplingFlags,
}

/// The result of extracting trace state from a carrier: exactly one of a full
/// context, a trace id with flags, or bare flags.
///
/// `extra` is carried independently of the variant so propagation payloads
/// survive even when identifiers are absent or malformed.
#[derive(Debug, Clone)]
pub struct TraceContextOrFlags {
    variant: ContextVariant,
    extra: Vec<Extra>,
}

/// Which shape of inbound trace state was present.
#[derive(Debug, Clone)]
pub enum ContextVariant {
    /// Full identifiers; eligible for a join.
    Context(TraceContext),
    /// Trace id only; the span id must be minted locally.
    TraceId(TraceIdContext),
    /// No identifiers, possibly a sampling decision.
    Flags(SamplingFlags),
}

impl TraceContextOrFlags {
    /// No identifiers and no decision.
    pub fn empty() -> Self {
        Self::from_flags(SamplingFlags::EMPTY)
    }

    /// Wraps a full context.
    pub fn from_context(context: TraceContext) -> Self {
        Self {
            variant: ContextVariant::Context(context),
            extra: Vec::new(),
        }
    }

    /// Wraps a trace id with flags.
    pub fn from_trace_id(context: TraceIdContext) -> Self {
        Self {
            variant: ContextVariant::TraceId(context),
            extra: Vec::new(),
        }
    }

    /// Wraps bare sampling flags.
    pub fn from_flags(flags: SamplingFlags) -> Self {
        Self {
            variant: ContextVariant::Flags(flags),
            extra: Vec::new(),
        }
    }

    /// Appends a propagation payload that should survive this hop.
    pub fn push_extra(mut self, extra: Extra) -> Self {
        self.extra.push(extra);
        self
    }

    /// The extracted shape.
    pub fn variant(&self) -> &ContextVariant {
        &self.variant
    }

    /// The full context, when one was extracted.
    pub fn context(&self) -> Option<&TraceContext> {
        match &self.variant {
            ContextVariant::Context(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// The sampling flags of whichever shape was extracted.
    pub fn sampling_flags(&self) -> SamplingFlags {
        match &self.variant {
            ContextVariant::Context(ctx) => ctx.sampling_flags(),
            ContextVariant::TraceId(ctx) => ctx.flags,
            ContextVariant::Flags(flags) => *flags,
        }
    }

    /// Payloads carried independently of the variant, in append order.
    pub fn extra(&self) -> &[Extra] {
        &self.extra
    }

    pub(crate) fn into_parts(self) -> (ContextVariant, Vec<Extra>) {
        (self.variant, self.extra)
    }
}

// ============================================================================
// Hex identifier parsing
// ============================================================================

/// Parses a 16-character lowercase hex span or parent id.
pub(crate) fn parse_span_id_hex(field: &'static str, value: &str) -> Result<u64> {
    parse_fixed_hex(field, value, 16)
}

/// Parses a trace id of 16 or 32 lowercase hex characters into
/// `(high, low)` halves.
pub(crate) fn parse_trace_id_hex(value: &str) -> Result<(u64, u64)> {
    match value.len() {
        16 => Ok((0, parse_fixed_hex("trace id", value, 16)?)),
        32 => {
            let high = parse_fixed_hex("trace id", &value[..16], 16)?;
            let low = parse_fixed_hex("trace id", &value[16..], 16)?;
            Ok((high, low))
        }
        _ => Err(Error::malformed_id("trace id", value, 16)),
    }
}

fn parse_fixed_hex(field: &'static str, value: &str, width: usize) -> Result<u64> {
    if value.len() != width
        || !value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(Error::malformed_id(field, value, width));
    }
    u64::from_str_radix(value, 16).map_err(|_| Error::malformed_id(field, value, width))
}
