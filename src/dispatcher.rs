//! Dispatcher (control thread) — spec.md §4.2
//!
//! The single task driving the main loop: consumes control events, selects
//! ready tables, hands data jobs to idle data workers, and declares drain.
//! Translated from an OS thread to a `tokio::task` per `SPEC_FULL.md` §0; the
//! loop body is otherwise a direct translation of spec.md §4.2's numbered steps.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::control_bus::{ControlEvent, ControlReceiver, WorkItem};
use crate::model::TableSchemaState;
use crate::scheduler::Scheduler;

/// Runs until a `Shutdown` event or the control channel closes. Any data
/// worker still parked on a `RequestJob` reply at that point is unblocked with
/// `None` so it can exit cleanly (spec.md §5 "Shutdown: ... joins all
/// threads").
pub async fn run(scheduler: Arc<Scheduler>, mut control_rx: ControlReceiver) {
    // Task-local: workers the dispatcher has told "nothing right now", kept so
    // a later WakeData can hand them work directly instead of making them poll
    // again. This is the `threads_waiting` bookkeeping from spec.md §5,
    // deliberately *not* behind its own mutex — it's owned solely by this task.
    let mut idle_waiters: VecDeque<oneshot::Sender<Option<WorkItem>>> = VecDeque::new();

    loop {
        let event = match control_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event {
            ControlEvent::RequestJob(reply) => {
                let (job, newly_done) = scheduler.find_ready_job();
                for table in newly_done {
                    scheduler.dispatch_index_jobs(&table).await;
                }
                match job {
                    Some(item) => {
                        let _ = reply.send(Some(item));
                    }
                    None => {
                        scheduler.threads_waiting.fetch_add(1, Ordering::SeqCst);
                        idle_waiters.push_back(reply);
                        maybe_declare_drain(&scheduler, &mut idle_waiters).await;
                    }
                }
            }

            ControlEvent::WakeData => {
                while !idle_waiters.is_empty() {
                    let (job, newly_done) = scheduler.find_ready_job();
                    for table in newly_done {
                        scheduler.dispatch_index_jobs(&table).await;
                    }
                    match job {
                        Some(item) => {
                            if let Some(waiter) = idle_waiters.pop_front() {
                                scheduler.threads_waiting.fetch_sub(1, Ordering::SeqCst);
                                let _ = waiter.send(Some(item));
                            }
                        }
                        None => break,
                    }
                }
            }

            ControlEvent::FileTypeEnded => {
                debug!("control bus: FILE_TYPE_ENDED, forcing table-list refresh");
                scheduler.all_data_jobs_enqueued.store(true, Ordering::SeqCst);
                // One guaranteed full pass over every table before we may
                // conclude nothing is ready (spec.md §9 open question).
                let (job, newly_done) = scheduler.find_ready_job();
                for table in newly_done {
                    scheduler.dispatch_index_jobs(&table).await;
                }
                if let Some(item) = job {
                    if let Some(waiter) = idle_waiters.pop_front() {
                        scheduler.threads_waiting.fetch_sub(1, Ordering::SeqCst);
                        let _ = waiter.send(Some(item));
                    } else {
                        // No worker currently asking for it; put it back so the
                        // next RequestJob (fast path) picks it straight up.
                        scheduler.return_job_undispatched(item);
                    }
                }
                maybe_declare_drain(&scheduler, &mut idle_waiters).await;
            }

            ControlEvent::SchemaPhaseEnded => {
                info!("control bus: SCHEMA_PHASE_ENDED, draining any buffered databases");
                for db in scheduler.registry.all_databases() {
                    db.mark_created_and_drain(&scheduler.schema_queue);
                }
            }

            ControlEvent::Shutdown => break,
        }
    }

    for waiter in idle_waiters.drain(..) {
        let _ = waiter.send(None);
    }
}

/// Declares drain complete once every table has reached `DATA_DONE` or later
/// and `FILE_TYPE_ENDED` has been observed (spec.md §4.2 step 4). Unblocks
/// every idle data worker with `None` so they can exit; index/schema worker
/// shutdown sentinels are the caller's (`main.rs`) responsibility once this
/// task returns.
async fn maybe_declare_drain(
    scheduler: &Arc<Scheduler>,
    idle_waiters: &mut VecDeque<oneshot::Sender<Option<WorkItem>>>,
) {
    if !scheduler.drain_complete() {
        return;
    }
    if scheduler
        .registry
        .all_tables_at_least(TableSchemaState::DataDone)
    {
        info!("all tables reached DATA_DONE; draining idle data workers");
        for waiter in idle_waiters.drain(..) {
            scheduler.threads_waiting.fetch_sub(1, Ordering::SeqCst);
            let _ = waiter.send(None);
        }
    }
}
