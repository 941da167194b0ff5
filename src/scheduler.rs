//! The `Scheduler` value: all dispatcher-owned state, generalized out of the
//! source system's global mutable dispatcher state per spec.md §9. Constructed
//! once in `main`, shared via `Arc`, never a process-level singleton.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::control_bus::{ControlSender, WorkItem};
use crate::model::{RestoreJob, TableSchemaState};
use crate::ready_queue::ReadyQueue;
use crate::registry::{TableDescriptor, TableRegistry};
use crate::schema_pipeline::SchemaJobQueue;

/// Aggregate counters surfaced by `progress.rs` and the final summary line.
#[derive(Default)]
pub struct DrainStats {
    pub tables_created: AtomicUsize,
    pub rows_loaded: AtomicUsize,
    pub ready_queue_hits: AtomicUsize,
    pub ready_queue_misses: AtomicUsize,
}

pub struct Scheduler {
    pub registry: TableRegistry,
    pub ready_queue: ReadyQueue,
    pub control_tx: ControlSender,
    pub index_tx: mpsc::Sender<WorkItem>,
    pub schema_queue: SchemaJobQueue,
    pub config: Config,
    pub stats: DrainStats,

    /// Set once producers have emitted all `RESTORE_DATA` jobs (spec.md §4.8
    /// `FILE_TYPE_ENDED`). Drain cannot be declared before this is true.
    pub all_data_jobs_enqueued: AtomicBool,
    /// How many data workers are currently idle, waiting on the dispatcher
    /// (surfaced for progress reporting; the actual wait queue is local to the
    /// dispatcher task — see `dispatcher.rs`).
    pub threads_waiting: AtomicUsize,
}

impl Scheduler {
    pub fn new(
        config: Config,
        control_tx: ControlSender,
        index_tx: mpsc::Sender<WorkItem>,
        schema_queue: SchemaJobQueue,
    ) -> Self {
        Self {
            registry: TableRegistry::new(),
            ready_queue: ReadyQueue::new(),
            control_tx,
            index_tx,
            schema_queue,
            config,
            stats: DrainStats::default(),
            all_data_jobs_enqueued: AtomicBool::new(false),
            threads_waiting: AtomicUsize::new(0),
        }
    }

    /// Fast path + slow path + terminal sweep, combined (spec.md §4.2 steps
    /// 1-3). Returns a job to dispatch if one exists right now, plus any
    /// tables the sweep just pushed into `DATA_DONE` (the caller awaits
    /// `dispatch_index_jobs` for those — kept out of this method so it stays
    /// a plain synchronous lock-and-scan, matching the bounded-critical-section
    /// rule in spec.md §5).
    pub fn find_ready_job(self: &Arc<Self>) -> (Option<WorkItem>, Vec<Arc<TableDescriptor>>) {
        let mut newly_done = Vec::new();

        // Fast path: O(1) pop, re-validate under the table's own lock.
        while let Some(table) = self.ready_queue.try_pop() {
            let mut g = table.lock();
            g.in_ready_queue = false;
            if let Some(item) = self.dispatch_from_locked(&table, &mut g) {
                self.stats.ready_queue_hits.fetch_add(1, Ordering::Relaxed);
                return (Some(item), newly_done);
            }
            // Not actually ready (state changed since it was queued, or it was
            // drained to zero jobs): fall through to sweep this table for a
            // terminal transition, then keep looking at the next entry.
            if self.maybe_advance_to_data_done(&table, &mut g) {
                newly_done.push(Arc::clone(&table));
            }
        }

        // Slow path: full scan in discovery order (spec.md §4.2 step 3).
        self.stats.ready_queue_misses.fetch_add(1, Ordering::Relaxed);
        for table in self.registry.snapshot_tables() {
            let mut g = table.lock();
            if let Some(item) = self.dispatch_from_locked(&table, &mut g) {
                return (Some(item), newly_done);
            }
            if self.maybe_advance_to_data_done(&table, &mut g) {
                newly_done.push(Arc::clone(&table));
            }
        }
        (None, newly_done)
    }

    /// Detach the head job from an already-locked, already-validated-ready
    /// table, re-enqueue it if jobs remain, and return the work item. Returns
    /// `None` without mutating anything if the table turns out not to be ready.
    fn dispatch_from_locked(
        self: &Arc<Self>,
        table: &Arc<TableDescriptor>,
        g: &mut crate::registry::TableInner,
    ) -> Option<WorkItem> {
        if !(g.schema_state == TableSchemaState::Created
            && g.job_count > 0
            && g.current_threads < table.max_threads
            && !table.is_view
            && !table.is_sequence
            && !table.no_data)
        {
            return None;
        }
        let job = g.restore_job_list.pop_front()?;
        g.job_count -= 1;
        g.current_threads += 1;
        table.try_enqueue_ready(g, &self.ready_queue, &self.control_tx);
        Some(WorkItem {
            table: Arc::clone(table),
            job,
        })
    }

    /// Dispatcher terminal sweep (spec.md §4.2 step 2/4): a table with no
    /// pending jobs, no in-flight workers, and no more jobs coming is done with
    /// its data phase. Returns `true` exactly when this call is what performed
    /// the `CREATED -> DATA_DONE` transition, so the caller can follow up with
    /// index-job dispatch.
    pub fn maybe_advance_to_data_done(&self, table: &Arc<TableDescriptor>, g: &mut crate::registry::TableInner) -> bool {
        if g.schema_state == TableSchemaState::Created
            && g.job_count == 0
            && g.current_threads == 0
            && table.remaining_jobs.load(Ordering::SeqCst) == 0
            && self.all_data_jobs_enqueued.load(Ordering::SeqCst)
        {
            g.schema_state = TableSchemaState::DataDone;
            self.stats.tables_created.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// §4.1 `DATA_DONE -> INDEX_ENQUEUED`: drain the table's buffered index
    /// jobs and hand them to the index worker pool. Call only after
    /// `maybe_advance_to_data_done` returned `true` for this table, with the
    /// table's lock already released (this takes its own lock).
    pub async fn dispatch_index_jobs(&self, table: &Arc<TableDescriptor>) {
        for job in table.take_index_jobs_and_advance() {
            let item = WorkItem {
                table: Arc::clone(table),
                job,
            };
            // Bounded channel: backpressure here is fine, the dispatcher loop
            // isn't the only thing the index workers wait on.
            let _ = self.index_tx.send(item).await;
        }
    }

    /// Push a `RESTORE_DATA`/DDL job onto a table's list and, if the table is
    /// already `CREATED`, make it ready (spec.md §4.2 enqueue-discipline entry
    /// point 2).
    pub fn enqueue_data_job(self: &Arc<Self>, table: &Arc<TableDescriptor>, job: RestoreJob) {
        let mut g = table.lock();
        g.restore_job_list.push_back(job);
        g.job_count += 1;
        table.remaining_jobs.fetch_add(1, Ordering::SeqCst);
        table.try_enqueue_ready(&mut g, &self.ready_queue, &self.control_tx);
    }

    /// Undo `dispatch_from_locked`'s mutation when a job was popped off a table
    /// but there turned out to be no worker to hand it to (the `FILE_TYPE_ENDED`
    /// forced-refresh path can hit this if it races a worker's own
    /// `RequestJob`). Puts the job back at the head of the table's list so FIFO
    /// order is preserved.
    pub fn return_job_undispatched(self: &Arc<Self>, item: WorkItem) {
        let mut g = item.table.lock();
        g.restore_job_list.push_front(item.job);
        g.job_count += 1;
        g.current_threads = g.current_threads.saturating_sub(1);
        item.table.try_enqueue_ready(&mut g, &self.ready_queue, &self.control_tx);
    }

    /// `true` once every known table has reached `DATA_DONE` or later *and* all
    /// data jobs have been enqueued. Per spec.md §9's open question, a full
    /// table-list refresh must have happened (i.e. `FILE_TYPE_ENDED` observed)
    /// before this may be trusted to conclude drain.
    pub fn drain_complete(&self) -> bool {
        self.all_data_jobs_enqueued.load(Ordering::SeqCst)
            && self.registry.all_tables_at_least(TableSchemaState::DataDone)
    }
}
