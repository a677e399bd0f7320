//! Cancellation contexts.
//!
//! A [`Context`] carries:
//! - a done-signal that resolves once the context is canceled or its deadline passes
//! - the [`ContextError`] that caused it
//! - an optional deadline
//! - a chain of caller-attached values, keyed by type
//!
//! Contexts are derived from a parent and share its lifecycle: when the parent
//! is done, so is every descendant. [`detach`] is the exception. It keeps the
//! parent's values reachable but gives the new context a lifecycle of its own.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use detached_context::context::{self, ContextExt};
//! use detached_context::TraceId;
//!
//! # async fn example() {
//! let root = context::with_value(&context::background(), TraceId::new());
//! let (scope, _guard) = context::with_timeout(&root, Duration::from_secs(2));
//!
//! // Survives `scope` timing out, still knows the trace id.
//! let (work, _work_guard) =
//!     context::with_timeout(&context::detach(&scope), Duration::from_secs(30));
//! assert!(work.value_of::<TraceId>().is_some());
//! # }
//! ```

mod cancel;
mod detached;
mod value;

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;

pub use cancel::{CancelContext, CancelGuard, with_cancel, with_deadline, with_timeout};
pub use detached::{DetachedContext, detach};
pub use value::{ValueContext, with_value};

use crate::error::ContextError;

/// Shared handle to any context.
pub type ContextRef = Arc<dyn Context>;

/// A value stored in a context's association chain.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Cancellation, deadline, and value lookup for one operation scope.
///
/// Implementations are immutable apart from the one-time transition to done,
/// and safe to share across any number of concurrent observers.
pub trait Context: fmt::Debug + Send + Sync {
    /// The instant after which this context is done, if any.
    fn deadline(&self) -> Option<Instant>;

    /// Resolves once this context is done. Each call returns a fresh future;
    /// all of them resolve.
    fn done(&self) -> BoxFuture<'_, ()>;

    /// `None` while the context is live, then the cause. Never changes once set.
    fn err(&self) -> Option<ContextError>;

    /// The instant this context became done, `None` while it is live.
    ///
    /// For an expired deadline this is the deadline itself, not the moment
    /// the expiry was first observed.
    fn done_at(&self) -> Option<Instant>;

    /// Looks up the value stored under `key`, walking up the chain.
    fn value(&self, key: TypeId) -> Option<AnyValue>;
}

/// Typed helpers available on every [`Context`].
pub trait ContextExt: Context {
    /// Looks up the value of type `T` attached to this context or an ancestor.
    fn value_of<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value(TypeId::of::<T>())?.downcast::<T>().ok()
    }

    fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Time left until the deadline, saturating at zero.
    fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl<C: Context + ?Sized> ContextExt for C {}

impl<C: Context + ?Sized> Context for Arc<C> {
    fn deadline(&self) -> Option<Instant> {
        (**self).deadline()
    }

    fn done(&self) -> BoxFuture<'_, ()> {
        (**self).done()
    }

    fn err(&self) -> Option<ContextError> {
        (**self).err()
    }

    fn done_at(&self) -> Option<Instant> {
        (**self).done_at()
    }

    fn value(&self, key: TypeId) -> Option<AnyValue> {
        (**self).value(key)
    }
}

/// Root of every context tree: never done, no deadline, no values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Background;

impl Context for Background {
    fn deadline(&self) -> Option<Instant> {
        None
    }

    fn done(&self) -> BoxFuture<'_, ()> {
        futures::future::pending().boxed()
    }

    fn err(&self) -> Option<ContextError> {
        None
    }

    fn done_at(&self) -> Option<Instant> {
        None
    }

    fn value(&self, _key: TypeId) -> Option<AnyValue> {
        None
    }
}

static BACKGROUND: LazyLock<ContextRef> = LazyLock::new(|| Arc::new(Background));

/// The shared root context.
pub fn background() -> ContextRef {
    Arc::clone(&BACKGROUND)
}
