//! Cancellation contexts that can be detached from their caller's lifecycle.
//!
//! A context handed to long-running work usually carries two unrelated
//! things: the caller's deadline and the caller's metadata (trace ids,
//! tenant, request id). [`detach`] separates them. The detached context keeps
//! every value of the original but is never canceled by it, so the work can
//! be given a deadline of its own with [`context::with_timeout`].
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use detached_context::{TraceId, context, race};
//!
//! # async fn example() -> detached_context::Result<()> {
//! let request = context::with_value(&context::background(), TraceId::new());
//! let (request, _request_guard) = context::with_timeout(&request, Duration::from_secs(2));
//!
//! let (work, _work_guard) =
//!     context::with_timeout(&context::detach(&request), Duration::from_secs(10));
//! let _answer = race(&work, async { "done" }).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod demo;
pub mod driver;
pub mod error;
pub mod observability;
pub mod trace;

#[cfg(test)]
mod testing;

pub use context::{Context, ContextExt, ContextRef, DetachedContext, detach};
pub use driver::race;
pub use error::{ConfigError, ContextError, Error, Result};
pub use trace::TraceId;
