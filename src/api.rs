//! Fixed-latency stand-in for a remote API call.

use std::time::Duration;

use crate::context::{Context, ContextExt};
use crate::driver::race;
use crate::error::Result;
use crate::trace::TraceId;

/// Response returned by [`SimulatedApi`] unless overridden.
pub const OK_RESPONSE: &str = "API call response: OK";

/// A remote call that always takes `latency` and then answers.
#[derive(Debug, Clone)]
pub struct SimulatedApi {
    latency: Duration,
    response: String,
}

impl SimulatedApi {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            response: OK_RESPONSE.to_string(),
        }
    }

    pub fn response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Performs the call without any context: sleeps, then answers.
    pub async fn invoke(&self) -> String {
        tokio::time::sleep(self.latency).await;
        self.response.clone()
    }

    /// Performs the call bounded by `ctx`.
    ///
    /// The underlying call is not interrupted when `ctx` is done first; it
    /// finishes in the background and its answer is dropped.
    pub async fn call<C: Context + ?Sized>(&self, ctx: &C) -> Result<String> {
        let trace_id = ctx.value_of::<TraceId>();
        tracing::debug!(
            trace_id = trace_id.as_deref().map(TraceId::as_str).unwrap_or(""),
            latency_ms = self.latency.as_millis() as u64,
            remaining_ms = ctx.remaining().map(|d| d.as_millis() as u64),
            "api call started"
        );

        let api = self.clone();
        let result = race(ctx, async move { api.invoke().await }).await;

        match &result {
            Ok(_) => tracing::debug!(
                trace_id = trace_id.as_deref().map(TraceId::as_str).unwrap_or(""),
                "api call answered"
            ),
            Err(e) => tracing::debug!(
                trace_id = trace_id.as_deref().map(TraceId::as_str).unwrap_or(""),
                error = %e,
                "api call abandoned"
            ),
        }
        result
    }
}
