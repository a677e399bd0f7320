//! Value-carrying contexts.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::context::{AnyValue, Context, ContextRef};
use crate::error::ContextError;

/// A context holding one value, keyed by the value's type.
///
/// Lifecycle comes entirely from the parent. Lookups for other keys continue
/// up the chain, so the nearest value of a given type shadows older ones.
pub struct ValueContext {
    parent: ContextRef,
    key: TypeId,
    type_name: &'static str,
    value: AnyValue,
}

impl fmt::Debug for ValueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueContext")
            .field("key", &self.type_name)
            .field("parent", &self.parent)
            .finish()
    }
}

impl Context for ValueContext {
    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn done(&self) -> BoxFuture<'_, ()> {
        self.parent.done()
    }

    fn err(&self) -> Option<ContextError> {
        self.parent.err()
    }

    fn done_at(&self) -> Option<Instant> {
        self.parent.done_at()
    }

    fn value(&self, key: TypeId) -> Option<AnyValue> {
        if key == self.key {
            return Some(Arc::clone(&self.value));
        }
        self.parent.value(key)
    }
}

/// Derives a child of `parent` carrying `value`.
///
/// Use a dedicated type per piece of metadata (e.g. [`TraceId`](crate::TraceId))
/// so unrelated callers cannot collide on a key.
pub fn with_value<T: Any + Send + Sync>(parent: &ContextRef, value: T) -> ContextRef {
    Arc::new(ValueContext {
        parent: Arc::clone(parent),
        key: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        value: Arc::new(value),
    })
}
