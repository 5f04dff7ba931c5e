//! The write/response barrier.
//!
//! A write handler must not flush its response until the cache has
//! been invalidated for the document it just touched — otherwise a
//! client that writes then immediately reads could observe its own
//! stale cached result. `WriteBarrier::run` spawns the invalidation as
//! its own task (so a slow cache doesn't block the write path from
//! being cancelled independently) and blocks the response on it with
//! a bounded timeout.

use std::time::Duration;

use tokio::time::timeout;

/// Run `invalidate` as an independent task and wait up to `budget` for
/// it to finish before returning. A timeout is logged by the caller
/// and does not fail the write — the mutation already committed to
/// the document store; only the cache may still be briefly stale.
pub struct WriteBarrier;

impl WriteBarrier {
    pub async fn run<F>(budget: Duration, invalidate: F) -> BarrierOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            invalidate();
        });
        match timeout(budget, handle).await {
            Ok(Ok(())) => BarrierOutcome::Completed,
            Ok(Err(_)) => BarrierOutcome::TaskPanicked,
            Err(_) => BarrierOutcome::TimedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    Completed,
    TimedOut,
    TaskPanicked,
}
