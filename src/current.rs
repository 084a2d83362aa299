//! Per-thread current trace context.
//!
//! Each execution thread has a stack of active contexts; the top is what
//! [`get`](CurrentTraceContext::get) returns and what new spans parent on.
//! Acquisition is scoped: [`new_scope`](CurrentTraceContext::new_scope)
//! installs a context (or clears it, for `None`) and hands back a [`Scope`]
//! whose release restores the previous top. Nesting is LIFO.
//!
//! A `Scope` is deliberately not `Send`: releasing on another thread is a
//! compile error. Crossing threads is explicit instead, via [`wrap`], which
//! captures the current context and re-installs it around the wrapped task.

use crate::context::TraceContext;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static ACTIVE: RefCell<Vec<Option<TraceContext>>> = const { RefCell::new(Vec::new()) };
}

/// Scope manager for the per-thread active context.
pub trait CurrentTraceContext: Send + Sync {
    /// The context currently active on the calling thread, if any.
    fn get(&self) -> Option<TraceContext>;

    /// Installs `context` as current on the calling thread. `None` installs
    /// "no current span". Dropping the returned scope restores the previous
    /// value.
    fn new_scope(&self, context: Option<TraceContext>) -> Scope;
}

/// A handle owning the restore action of one scope acquisition.
///
/// Dropping it restores whatever was current before the acquisition.
pub struct Scope {
    restore: Option<Box<dyn FnOnce()>>,
    // pokes at thread-local state, so must be released where it was acquired
    _not_send: PhantomData<*const ()>,
}

impl Scope {
    /// Wraps a restore action to run on release.
    pub fn new(restore: impl FnOnce() + 'static) -> Self {
        Self {
            restore: Some(Box::new(restore)),
            _not_send: PhantomData,
        }
    }

    /// A scope that restores nothing.
    pub fn noop() -> Self {
        Self {
            restore: None,
            _not_send: PhantomData,
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

fn current_top() -> Option<TraceContext> {
    ACTIVE.with(|stack| stack.borrow().last().cloned().flatten())
}

fn push_scope(context: Option<TraceContext>, strict: bool) -> Scope {
    let depth = ACTIVE.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(context);
        stack.len()
    });
    Scope::new(move || {
        ACTIVE.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() == depth {
                stack.pop();
            } else if strict {
                panic!(
                    "scope released out of order: depth {} expected {depth}",
                    stack.len()
                );
            } else {
                tracing::error!(
                    depth = stack.len(),
                    expected = depth,
                    "scope released out of order; restoring the enclosing context"
                );
                stack.truncate(depth.saturating_sub(1));
            }
        });
    })
}

/// The default scope manager: a thread-local stack, tolerant of misuse.
///
/// An out-of-order release logs an error and restores the state from before
/// the offending scope was acquired.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalCurrentTraceContext;

impl CurrentTraceContext for ThreadLocalCurrentTraceContext {
    fn get(&self) -> Option<TraceContext> {
        current_top()
    }

    fn new_scope(&self, context: Option<TraceContext>) -> Scope {
        push_scope(context, false)
    }
}

/// A scope manager that panics on out-of-order release.
///
/// Use in tests and development to surface instrumentation bugs that the
/// lenient default would paper over. Shares the same per-thread stack as
/// [`ThreadLocalCurrentTraceContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictCurrentTraceContext;

impl CurrentTraceContext for StrictCurrentTraceContext {
    fn get(&self) -> Option<TraceContext> {
        current_top()
    }

    fn new_scope(&self, context: Option<TraceContext>) -> Scope {
        push_scope(context, true)
    }
}

/// Captures the calling thread's current context and returns a task that
/// runs `f` with that context installed, wherever it executes.
pub fn wrap<F>(current: &Arc<dyn CurrentTraceContext>, f: F) -> impl FnOnce() + Send + 'static
where
    F: FnOnce() + Send + 'static,
{
    let context = current.get();
    let current = Arc::clone(current);
    move || {
        let _scope = current.new_scope(context);
        f();
    }
}
