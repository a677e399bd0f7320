//! Contexts detached from their parent's lifecycle.
//!
//! [`detach`] keeps the trace and correlation values of a context reachable
//! while dropping its cancellation and deadline. Use it for work that must
//! outlive the caller's scope but still has to be attributed to the caller,
//! such as fire-and-forget side effects started from a request handler.
//!
//! A detached context is never done by itself. Compose a fresh deadline on top
//! when the work needs a bound of its own:
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use detached_context::context::{self, ContextRef};
//!
//! # fn example(request: &ContextRef) {
//! let (ctx, _guard) = context::with_timeout(&context::detach(request), Duration::from_secs(5));
//! # }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::context::{AnyValue, Context, ContextRef, background};
use crate::error::ContextError;

/// A context whose lifecycle and values come from two different contexts.
///
/// `done`, `err`, `done_at` and `deadline` are answered by `lifecycle` only.
/// `value` is answered by `values` only. The `values` context is never asked
/// about cancellation or deadline.
#[derive(Debug, Clone)]
pub struct DetachedContext {
    lifecycle: ContextRef,
    values: ContextRef,
}

impl DetachedContext {
    pub fn new(lifecycle: ContextRef, values: ContextRef) -> Self {
        Self { lifecycle, values }
    }

    /// The context values are read from.
    pub fn values(&self) -> &ContextRef {
        &self.values
    }
}

impl Context for DetachedContext {
    fn deadline(&self) -> Option<Instant> {
        self.lifecycle.deadline()
    }

    fn done(&self) -> BoxFuture<'_, ()> {
        self.lifecycle.done()
    }

    fn err(&self) -> Option<ContextError> {
        self.lifecycle.err()
    }

    fn done_at(&self) -> Option<Instant> {
        self.lifecycle.done_at()
    }

    fn value(&self, key: TypeId) -> Option<AnyValue> {
        self.values.value(key)
    }
}

/// Returns a context that keeps `ctx`'s values but is never canceled and has
/// no deadline, even if `ctx` is already done.
pub fn detach(ctx: &ContextRef) -> ContextRef {
    tracing::trace!("detaching context");
    Arc::new(DetachedContext::new(background(), Arc::clone(ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio_test::{assert_pending, task};

    use crate::context::{ContextExt, with_cancel, with_timeout, with_value};
    use crate::testing::assert_elapsed;
    use crate::trace::TraceId;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    /// Counts every lifecycle query it receives; values come from `inner`.
    #[derive(Debug)]
    struct CountingLifecycle {
        inner: ContextRef,
        lifecycle_reads: AtomicUsize,
    }

    impl CountingLifecycle {
        fn touched(&self) {
            self.lifecycle_reads.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Context for CountingLifecycle {
        fn deadline(&self) -> Option<Instant> {
            self.touched();
            self.inner.deadline()
        }

        fn done(&self) -> BoxFuture<'_, ()> {
            self.touched();
            self.inner.done()
        }

        fn err(&self) -> Option<ContextError> {
            self.touched();
            self.inner.err()
        }

        fn done_at(&self) -> Option<Instant> {
            self.touched();
            self.inner.done_at()
        }

        fn value(&self, key: TypeId) -> Option<AnyValue> {
            self.inner.value(key)
        }
    }

    #[test]
    fn detached_from_live_context_is_not_done() {
        let (parent, _guard) = with_cancel(&background());
        let ctx = detach(&parent);

        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());
    }

    #[test]
    fn detached_from_canceled_context_is_not_done() {
        let (parent, guard) = with_cancel(&background());
        guard.cancel();
        assert!(parent.is_done());

        let ctx = detach(&parent);

        assert!(ctx.err().is_none());
        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());
    }

    #[test]
    fn parent_cancel_after_detach_does_not_reach_detached() {
        let (parent, guard) = with_cancel(&background());
        let ctx = detach(&parent);
        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());

        guard.cancel();

        assert!(!done.is_woken());
        assert_pending!(done.poll());
        assert!(ctx.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn detached_from_expired_context_is_not_done() {
        let (parent, _guard) = with_timeout(&background(), Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(5)).await;
        assert_eq!(parent.err(), Some(ContextError::DeadlineExceeded));

        let ctx = detach(&parent);

        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn values_are_delegated_to_original() {
        let trace = TraceId::new();
        let original = with_value(&background(), trace.clone());
        let original = with_value(&original, Tenant("acme"));
        let (original, guard) = with_cancel(&original);
        guard.cancel();

        let ctx = detach(&original);

        assert_eq!(ctx.value_of::<TraceId>(), original.value_of::<TraceId>());
        assert_eq!(ctx.value_of::<TraceId>().as_deref(), Some(&trace));
        assert_eq!(ctx.value_of::<Tenant>().as_deref(), Some(&Tenant("acme")));
    }

    #[test]
    fn original_lifecycle_is_never_consulted() {
        let (inner, guard) = with_cancel(&with_value(&background(), Tenant("acme")));
        guard.cancel();
        let counting = Arc::new(CountingLifecycle {
            inner,
            lifecycle_reads: AtomicUsize::new(0),
        });
        let original: ContextRef = counting.clone();

        let ctx = detach(&original);
        assert!(ctx.err().is_none());
        assert!(ctx.done_at().is_none());
        assert!(ctx.deadline().is_none());
        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());
        assert_eq!(ctx.value_of::<Tenant>().as_deref(), Some(&Tenant("acme")));

        assert_eq!(counting.lifecycle_reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn absent_values_stay_absent() {
        let original = with_value(&background(), Tenant("acme"));
        let ctx = detach(&original);
        assert!(ctx.value_of::<TraceId>().is_none());
    }

    #[test]
    fn values_are_stable_across_reads() {
        let original = with_value(&background(), Tenant("acme"));
        let ctx = detach(&original);
        for _ in 0..3 {
            assert_eq!(ctx.value_of::<Tenant>().as_deref(), Some(&Tenant("acme")));
            assert!(ctx.err().is_none());
        }
    }

    #[test]
    fn values_reads_the_original() {
        let original = with_value(&background(), Tenant("acme"));
        let detached = DetachedContext::new(background(), Arc::clone(&original));
        assert!(Arc::ptr_eq(detached.values(), &original));
    }

    #[test]
    fn explicit_lifecycle_is_honored() {
        let (lifecycle, guard) = with_cancel(&background());
        let (original, _original_guard) = with_cancel(&with_value(&background(), Tenant("acme")));
        let ctx = DetachedContext::new(lifecycle, Arc::clone(&original));

        guard.cancel();

        assert_eq!(ctx.err(), Some(ContextError::Canceled));
        assert!(!original.is_done());
        assert_eq!(ctx.value_of::<Tenant>().as_deref(), Some(&Tenant("acme")));
    }

    #[tokio::test(start_paused = true)]
    async fn extended_deadline_ignores_shorter_original_deadline() {
        let original = with_value(&background(), Tenant("acme"));
        let (original, _original_guard) = with_timeout(&original, Duration::from_secs(2));

        let start = Instant::now();
        let (extended, _guard) = with_timeout(&detach(&original), Duration::from_secs(5));
        assert_eq!(extended.deadline(), Some(start + Duration::from_secs(5)));

        extended.done().await;

        assert_elapsed(start, Duration::from_secs(5));
        assert_eq!(extended.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(original.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(extended.value_of::<Tenant>().as_deref(), Some(&Tenant("acme")));
    }

    #[tokio::test(start_paused = true)]
    async fn extended_deadline_ignores_already_expired_original() {
        let (original, _original_guard) = with_timeout(&background(), Duration::from_millis(10));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(original.is_done());

        let start = Instant::now();
        let (extended, _guard) = with_timeout(&detach(&original), Duration::from_secs(3));
        assert!(extended.err().is_none());

        extended.done().await;

        assert_elapsed(start, Duration::from_secs(3));
        assert_eq!(extended.err(), Some(ContextError::DeadlineExceeded));
    }
}
