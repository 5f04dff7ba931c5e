//! Write-route barrier wiring: compute victims from the mutation
//! event, remove them clusterwide, and gate the response on it.

use std::sync::Arc;

use crate::barrier::{BarrierOutcome, WriteBarrier};
use crate::cache::ClusterCache;
use crate::invalidation::{InvalidationEngine, MutationEvent};
use crate::observability::{Logger, Severity};

use super::state::AppState;

/// Run the invalidation sweep for `event` under the write barrier,
/// flushing the response only after it completes or the barrier
/// budget elapses.
pub async fn invalidate_under_barrier(state: &AppState, event: MutationEvent) -> BarrierOutcome {
    let cache: Arc<ClusterCache> = state.cache.clone();
    let engine: InvalidationEngine = state.invalidation;
    let snapshot = cache.keys();

    let outcome = WriteBarrier::run(state.barrier_budget, move || {
        let victims = engine.keys_to_invalidate(&snapshot, &event);
        if !victims.is_empty() {
            cache.remove_keys(victims);
        }
    })
    .await;

    if outcome == BarrierOutcome::TimedOut {
        Logger::log_stderr(Severity::Critical, "invalidation_timed_out", &[]);
    }
    outcome
}
