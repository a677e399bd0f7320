//! Racing a unit of work against a context's done-signal.
//!
//! [`race`] is the only place the caller suspends. The work runs on its own
//! tokio task and reports on a single-use channel; the caller waits for
//! whichever of the channel and [`Context::done`] is ready first.
//!
//! The worker is never canceled or joined. When the context wins, the worker
//! keeps running to completion and its result is discarded. There is no
//! cooperative cancellation protocol between the two sides.
//!
//! If both sides are ready in the same poll, `tokio::select!` picks one at
//! random, so either outcome is possible at an exact tie.

use std::future::Future;

use tokio::sync::oneshot;

use crate::context::Context;
use crate::error::{ContextError, Error, Result};

/// Runs `work` on a detached task and returns its output, unless `ctx` is
/// done first, in which case the context's error is returned.
///
/// Returns [`Error::WorkerLost`] if the worker ends without producing output
/// (for example because it panicked).
pub async fn race<C, F, T>(ctx: &C, work: F) -> Result<T>
where
    C: Context + ?Sized,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    // Handle dropped on purpose: the worker is fire-and-forget.
    drop(tokio::spawn(async move {
        let output = work.await;
        if tx.send(output).is_err() {
            tracing::debug!("worker finished after its caller stopped waiting");
        }
    }));

    tokio::select! {
        _ = ctx.done() => {
            let err = ctx.err().unwrap_or(ContextError::Canceled);
            tracing::debug!(error = %err, "context done before worker, abandoning worker");
            Err(err.into())
        }
        output = rx => output.map_err(|_| Error::WorkerLost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;
    use tracing_test::traced_test;

    use crate::context::{background, with_cancel, with_timeout};
    use crate::testing::assert_elapsed;

    async fn slow(latency: Duration, value: &'static str) -> &'static str {
        tokio::time::sleep(latency).await;
        value
    }

    #[tokio::test(start_paused = true)]
    async fn returns_output_when_work_finishes_first() {
        let (ctx, _guard) = with_timeout(&background(), Duration::from_secs(5));
        let start = Instant::now();

        let result = race(&ctx, slow(Duration::from_secs(4), "ok")).await;

        assert_eq!(result.unwrap(), "ok");
        assert_elapsed(start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_deadline_exceeded_when_context_expires_first() {
        let (ctx, _guard) = with_timeout(&background(), Duration::from_secs(2));
        let start = Instant::now();

        let err = race(&ctx, slow(Duration::from_secs(4), "ok"))
            .await
            .unwrap_err();

        assert_eq!(err.context_error(), Some(ContextError::DeadlineExceeded));
        assert_eq!(err.to_string(), "context deadline exceeded");
        assert_elapsed(start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn background_context_waits_for_work() {
        let start = Instant::now();
        let result = race(&background(), slow(Duration::from_secs(30), "late")).await;
        assert_eq!(result.unwrap(), "late");
        assert_elapsed(start, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_returns_canceled() {
        let (ctx, guard) = with_cancel(&background());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            guard.cancel();
        });

        let err = race(&ctx, slow(Duration::from_secs(4), "ok"))
            .await
            .unwrap_err();

        assert_eq!(err.context_error(), Some(ContextError::Canceled));
        assert_eq!(err.to_string(), "context canceled");
    }

    #[tokio::test(start_paused = true)]
    async fn already_done_context_returns_immediately() {
        let (ctx, guard) = with_cancel(&background());
        guard.cancel();
        let start = Instant::now();

        let err = race(&ctx, slow(Duration::from_secs(4), "ok"))
            .await
            .unwrap_err();

        assert_eq!(err.context_error(), Some(ContextError::Canceled));
        assert_elapsed(start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_keeps_running_after_context_wins() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let (ctx, _guard) = with_timeout(&background(), Duration::from_secs(1));

        let result = race(&ctx, async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(result.is_err());
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_worker_is_reported_as_lost() {
        let result: Result<()> = race(&background(), async { panic!("worker blew up") }).await;
        assert!(matches!(result, Err(Error::WorkerLost)));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn abandoning_a_worker_is_logged() {
        let (ctx, _guard) = with_timeout(&background(), Duration::from_millis(10));
        let _ = race(&ctx, slow(Duration::from_secs(1), "ok")).await;
        assert!(logs_contain("abandoning worker"));
    }
}
