//! Bounded-cadence progress reporting (spec.md §7 "Progress messages emit on a
//! bounded cadence", `SPEC_FULL.md` §2 item 14).
//!
//! Modeled the way the teacher throttles its own periodic redraws off a
//! `tokio::time::interval` rather than emitting on every state change.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::model::TableSchemaState;
use crate::scheduler::Scheduler;

const TICK: Duration = Duration::from_secs(5);

/// Runs until `scheduler.drain_complete()` and every table has reached
/// `ALL_DONE`/`Failed`, logging one summary line per tick. `main` spawns this
/// alongside the dispatcher and worker pools and does not wait on it; it exits
/// on its own once the restore is done.
pub async fn run(scheduler: Arc<Scheduler>) {
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        let created = scheduler.stats.tables_created.load(Ordering::Relaxed);
        let failed = scheduler
            .registry
            .snapshot_tables()
            .iter()
            .filter(|t| t.schema_state() == TableSchemaState::Failed)
            .count();
        let rows = scheduler.stats.rows_loaded.load(Ordering::Relaxed);
        let hits = scheduler.stats.ready_queue_hits.load(Ordering::Relaxed);
        let misses = scheduler.stats.ready_queue_misses.load(Ordering::Relaxed);
        let total = scheduler.registry.table_count();

        info!(
            tables_data_done = created,
            tables_total = total,
            tables_failed = failed,
            rows_loaded = rows,
            ready_queue_hits = hits,
            ready_queue_misses = misses,
            "restore progress"
        );

        if scheduler.drain_complete() && scheduler.ready_queue.is_empty() {
            break;
        }
    }
}
