//! Cancellable and deadline-bound contexts.
//!
//! A [`CancelContext`] becomes done when the first of these happens:
//! - its [`CancelGuard`] is canceled or dropped
//! - its deadline passes
//! - its parent becomes done
//!
//! Nothing runs in the background. Expiry is observed by the clock when
//! [`Context::err`] is read and by a timer inside [`Context::done`], so a
//! context that nobody waits on costs nothing after its guard is released.

use std::any::TypeId;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::{AnyValue, Context, ContextRef};
use crate::error::ContextError;

/// A context that can be canceled explicitly and may carry a deadline.
///
/// Created by [`with_cancel`], [`with_deadline`] or [`with_timeout`].
#[derive(Debug)]
pub struct CancelContext {
    parent: ContextRef,
    token: CancellationToken,
    /// Earlier of the requested deadline and the parent's.
    deadline: Option<Instant>,
    /// Cause and the instant the context became done.
    cause: OnceLock<(ContextError, Instant)>,
}

impl CancelContext {
    fn new(parent: &ContextRef, deadline: Option<Instant>) -> Arc<Self> {
        let deadline = match (deadline, parent.deadline()) {
            (Some(own), Some(inherited)) => Some(own.min(inherited)),
            (own, inherited) => own.or(inherited),
        };
        Arc::new(Self {
            parent: Arc::clone(parent),
            token: CancellationToken::new(),
            deadline,
            cause: OnceLock::new(),
        })
    }

    /// Stores the cause if none is set yet and returns whichever cause won.
    fn record(&self, cause: ContextError, at: Instant) -> (ContextError, Instant) {
        let mut first = false;
        let recorded = *self.cause.get_or_init(|| {
            first = true;
            (cause, at)
        });
        if first {
            tracing::debug!(cause = %recorded.0, deadline = ?self.deadline, "context done");
        }
        recorded
    }

    /// The recorded cause, or whichever of parent-done and deadline-passed
    /// happened first, recorded now.
    fn observe(&self) -> Option<(ContextError, Instant)> {
        if let Some(recorded) = self.cause.get() {
            return Some(*recorded);
        }

        let from_parent = self.parent.err().map(|err| {
            let at = self.parent.done_at().unwrap_or_else(Instant::now);
            (err, at)
        });
        let expired = self
            .deadline
            .filter(|deadline| Instant::now() >= *deadline)
            .map(|deadline| (ContextError::DeadlineExceeded, deadline));

        let (cause, at) = match (from_parent, expired) {
            (Some(parent), Some(own)) if own.1 < parent.1 => own,
            (Some(parent), _) => parent,
            (None, own) => own?,
        };
        Some(self.record(cause, at))
    }

    fn cancel(&self) {
        if self.observe().is_none() {
            self.record(ContextError::Canceled, Instant::now());
        }
        self.token.cancel();
    }
}

impl Context for CancelContext {
    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn done(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.err().is_some() {
                return;
            }

            let expiry = async {
                match self.deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(deadline).await;
                        Some(deadline)
                    }
                    None => std::future::pending().await,
                }
            };

            let expired = tokio::select! {
                _ = self.token.cancelled() => None,
                _ = self.parent.done() => None,
                deadline = expiry => deadline,
            };

            // The timer may round differently from `Instant::now()`; what fired wins.
            if let Some(deadline) = expired
                && self.err().is_none()
            {
                self.record(ContextError::DeadlineExceeded, deadline);
            }
        })
    }

    fn err(&self) -> Option<ContextError> {
        self.observe().map(|(cause, _)| cause)
    }

    fn done_at(&self) -> Option<Instant> {
        self.observe().map(|(_, at)| at)
    }

    fn value(&self, key: TypeId) -> Option<AnyValue> {
        self.parent.value(key)
    }
}

/// Release handle for a [`CancelContext`].
///
/// Dropping the guard cancels the context, so the context is released on every
/// exit path of the scope that owns the guard. Canceling more than once is a
/// no-op; the first cause sticks.
#[must_use = "dropping the guard cancels the context immediately"]
#[derive(Debug)]
pub struct CancelGuard {
    ctx: Arc<CancelContext>,
}

impl CancelGuard {
    /// Cancels the context now.
    pub fn cancel(self) {
        self.ctx.cancel();
    }

    /// The context this guard releases.
    pub fn context(&self) -> ContextRef {
        Arc::clone(&self.ctx) as ContextRef
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

fn derive(parent: &ContextRef, deadline: Option<Instant>) -> (ContextRef, CancelGuard) {
    let ctx = CancelContext::new(parent, deadline);
    let guard = CancelGuard {
        ctx: Arc::clone(&ctx),
    };
    (ctx as ContextRef, guard)
}

/// Derives a child that is done when `parent` is done or the guard is released.
pub fn with_cancel(parent: &ContextRef) -> (ContextRef, CancelGuard) {
    derive(parent, None)
}

/// Derives a child that is also done once `deadline` passes.
///
/// If `parent` already has an earlier deadline, the child keeps the parent's.
pub fn with_deadline(parent: &ContextRef, deadline: Instant) -> (ContextRef, CancelGuard) {
    tracing::trace!(deadline = ?deadline, "deriving deadline context");
    derive(parent, Some(deadline))
}

/// Derives a child that is also done `timeout` from now.
///
/// A timeout too large to represent as an [`Instant`] means no deadline.
pub fn with_timeout(parent: &ContextRef, timeout: Duration) -> (ContextRef, CancelGuard) {
    match Instant::now().checked_add(timeout) {
        Some(deadline) => with_deadline(parent, deadline),
        None => with_cancel(parent),
    }
}
