//! Table Registry & State Machine (spec.md §4.1)
//!
//! Owns every database and table descriptor, keyed by name. All reads/writes of
//! `schema_state` and the other descriptor fields happen under the descriptor's
//! own `std::sync::Mutex`; this mutex is never held across an `.await`, matching
//! the lock-order rule in spec.md §5 that a table mutex critical section stays
//! bounded. Cross-task wakeup uses `tokio::sync::Notify`, tokio's substitute for
//! a condvar's `broadcast` (see `SPEC_FULL.md` §0).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::RestoreError;
use crate::model::{DbSchemaState, RestoreJob, TableSchemaState};
use crate::ready_queue::ReadyQueue;

// ─────────────────────────────────────────────────────────────────────────────
// Database descriptor
// ─────────────────────────────────────────────────────────────────────────────

struct DatabaseInner {
    schema_state: DbSchemaState,
    /// Schema jobs for tables in this database that arrived before `CREATED`.
    pending_table_queue: VecDeque<crate::schema_pipeline::SchemaWorkItem>,
}

/// In-memory record for one target database (spec.md §3).
pub struct DatabaseDescriptor {
    pub target_name: String,
    inner: Mutex<DatabaseInner>,
    notify: Notify,
}

impl std::fmt::Debug for DatabaseDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseDescriptor")
            .field("target_name", &self.target_name)
            .field("schema_state", &self.state())
            .finish()
    }
}

impl DatabaseDescriptor {
    fn new(target_name: String) -> Self {
        Self {
            target_name,
            inner: Mutex::new(DatabaseInner {
                schema_state: DbSchemaState::NotCreated,
                pending_table_queue: VecDeque::new(),
            }),
            notify: Notify::new(),
        }
    }

    pub fn state(&self) -> DbSchemaState {
        self.inner.lock().unwrap().schema_state
    }

    /// Schema worker transition: `NOT_CREATED -> CREATING`, before issuing DDL.
    pub fn mark_creating(&self) {
        let mut g = self.inner.lock().unwrap();
        debug_assert!(g.schema_state <= DbSchemaState::Creating);
        g.schema_state = DbSchemaState::Creating;
    }

    /// §4.3 protocol: push the job directly to the schema queue if the database
    /// is already `CREATED`, otherwise buffer it. Locked under `D.mutex` for the
    /// whole check-then-act so a concurrent `mark_created_and_drain` can't miss it.
    pub fn enqueue_or_buffer(
        &self,
        table: Arc<TableDescriptor>,
        job: RestoreJob,
        schema_queue: &crate::schema_pipeline::SchemaJobQueue,
    ) {
        let mut g = self.inner.lock().unwrap();
        if g.schema_state == DbSchemaState::Created {
            drop(g);
            schema_queue.push(table, job);
        } else {
            g.pending_table_queue.push_back(crate::schema_pipeline::SchemaWorkItem {
                table,
                job,
                attempt: 0,
            });
        }
    }

    /// §4.3: transition to `CREATED` and drain `pending_table_queue` atomically
    /// under `D.mutex`, then broadcast to anyone waiting on this database.
    /// Skips the drain if already `CREATED` (idempotent, safe to call twice from
    /// the `SCHEMA_PHASE_ENDED` sweep and the normal schema-worker path).
    pub fn mark_created_and_drain(&self, schema_queue: &crate::schema_pipeline::SchemaJobQueue) {
        let drained: Vec<_> = {
            let mut g = self.inner.lock().unwrap();
            if g.schema_state == DbSchemaState::Created {
                return;
            }
            g.schema_state = DbSchemaState::Created;
            g.pending_table_queue.drain(..).collect()
        };
        for item in drained {
            schema_queue.push_item(item);
        }
        self.notify.notify_waiters();
    }

    pub async fn wait_created(&self) {
        loop {
            let notified = self.notify.notified();
            if self.state() == DbSchemaState::Created {
                return;
            }
            notified.await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table descriptor
// ─────────────────────────────────────────────────────────────────────────────

pub struct TableInner {
    pub schema_state: TableSchemaState,
    /// FIFO of pending restore jobs not yet handed to a worker.
    pub restore_job_list: VecDeque<RestoreJob>,
    /// Cached `restore_job_list.len()`; kept separate per spec.md §3 so the
    /// readiness predicate doesn't need to walk the list.
    pub job_count: usize,
    pub current_threads: u32,
    pub in_ready_queue: bool,
    pub last_error: Option<RestoreError>,
    /// `CREATE_INDEX`/`ALTER_POST_DATA` jobs discovered during the schema phase,
    /// held back until `DATA_DONE` (spec.md §4.1 `DATA_DONE -> INDEX_ENQUEUED`).
    pub index_job_list: VecDeque<RestoreJob>,
    /// Index jobs handed to the index worker pool but not yet completed.
    pub index_remaining: usize,
}

/// In-memory record for one target table (spec.md §3).
pub struct TableDescriptor {
    pub database: Arc<DatabaseDescriptor>,
    pub source_table_name: String,
    pub target_table_name: String,
    pub is_view: bool,
    pub is_sequence: bool,
    pub no_data: bool,
    pub max_threads: u32,
    /// Atomic: pending + in-flight jobs. `remaining_jobs >= job_count` always
    /// (spec.md §3 invariant); reaching zero for every table is the drain signal.
    pub remaining_jobs: AtomicI64,
    inner: Mutex<TableInner>,
    notify: Notify,
}

impl std::fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("database", &self.database.target_name)
            .field("target_table_name", &self.target_table_name)
            .field("schema_state", &self.schema_state())
            .finish()
    }
}

impl TableDescriptor {
    fn new(
        database: Arc<DatabaseDescriptor>,
        source_table_name: String,
        target_table_name: String,
        is_view: bool,
        is_sequence: bool,
        no_data: bool,
        max_threads: u32,
    ) -> Self {
        Self {
            database,
            source_table_name,
            target_table_name,
            is_view,
            is_sequence,
            no_data,
            max_threads,
            remaining_jobs: AtomicI64::new(0),
            inner: Mutex::new(TableInner {
                schema_state: TableSchemaState::NotCreated,
                restore_job_list: VecDeque::new(),
                job_count: 0,
                current_threads: 0,
                in_ready_queue: false,
                last_error: None,
                index_job_list: VecDeque::new(),
                index_remaining: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap()
    }

    pub fn schema_state(&self) -> TableSchemaState {
        self.lock().schema_state
    }

    /// Readiness predicate (spec.md §4.2 / GLOSSARY). Caller must already hold
    /// `g`, the lock on this same descriptor.
    fn is_ready_locked(&self, g: &TableInner) -> bool {
        g.schema_state == TableSchemaState::Created
            && g.job_count > 0
            && g.current_threads < self.max_threads
            && !self.is_view
            && !self.is_sequence
            && !self.no_data
    }

    /// §4.2 `try_enqueue_ready`: must be called with `g` already locked by the
    /// caller (schema worker completing a CREATE, a producer appending a job, the
    /// dispatcher re-enqueueing a partially-drained table, a data worker finishing
    /// a job, or the dispatcher's fallback scan). Pushes at most once per logical
    /// readiness window (`in_ready_queue` dedupes), then nudges the dispatcher.
    pub fn try_enqueue_ready(
        self: &Arc<Self>,
        g: &mut TableInner,
        ready: &ReadyQueue,
        control_tx: &crate::control_bus::ControlSender,
    ) {
        if self.is_ready_locked(g) && !g.in_ready_queue {
            g.in_ready_queue = true;
            ready.push(Arc::clone(self));
            let _ = control_tx.send(crate::control_bus::ControlEvent::WakeData);
        }
    }

    /// Schema worker: `NOT_CREATED -> CREATING`.
    pub fn mark_creating(&self) {
        let mut g = self.lock();
        g.schema_state = TableSchemaState::Creating;
    }

    /// Schema worker: `CREATING -> CREATED` on DDL success. Must broadcast and
    /// attempt a ready-queue enqueue before releasing the lock (spec.md §4.1).
    pub fn mark_created(self: &Arc<Self>, ready: &ReadyQueue, control_tx: &crate::control_bus::ControlSender) {
        {
            let mut g = self.lock();
            g.schema_state = TableSchemaState::Created;
            self.try_enqueue_ready(&mut g, ready, control_tx);
        }
        self.notify.notify_waiters();
    }

    /// Views/sequences short-circuit straight to `ALL_DONE` once their schema
    /// is applied (spec.md §3 "Lifecycles").
    pub fn mark_all_done_no_data(&self) {
        let mut g = self.lock();
        g.schema_state = TableSchemaState::AllDone;
        drop(g);
        self.notify.notify_waiters();
    }

    /// Schema worker on DDL failure: the table stays `CREATING`; the caller is
    /// responsible for re-pushing the *job itself* into the retry queue
    /// (spec.md §4.5 — never a null placeholder).
    pub fn record_schema_failure(&self, err: RestoreError) {
        self.lock().last_error = Some(err);
    }

    /// Terminal-failure state for retry exhaustion (spec.md §9 open question).
    pub fn mark_failed(&self, err: RestoreError) {
        let mut g = self.lock();
        g.schema_state = TableSchemaState::Failed;
        g.last_error = Some(err);
        drop(g);
        self.notify.notify_waiters();
    }

    /// Data worker defensive barrier (spec.md §4.4 step 2): block until
    /// `schema_state >= CREATED`. Under normal dispatch this never actually
    /// waits, since the dispatcher only hands out jobs for `CREATED` tables;
    /// it exists for jobs re-dispatched from a retry path.
    pub async fn wait_until_created(&self) {
        loop {
            let notified = self.notify.notified();
            if self.schema_state() >= TableSchemaState::Created {
                return;
            }
            notified.await;
        }
    }

    pub fn full_key(&self) -> (String, String) {
        (self.database.target_name.clone(), self.target_table_name.clone())
    }

    /// Buffer an index/post-data-alter job discovered during the schema phase.
    /// Held until the table reaches `DATA_DONE` (spec.md §4.1).
    pub fn push_index_job(&self, job: RestoreJob) {
        self.lock().index_job_list.push_back(job);
    }

    /// `DATA_DONE -> INDEX_ENQUEUED`, draining the buffered index jobs for the
    /// caller (the dispatcher) to hand to the index worker pool. If there were
    /// none, transitions straight through to `ALL_DONE` and returns an empty
    /// vec — a table with no indexes has nothing for the index pool to do.
    pub fn take_index_jobs_and_advance(self: &Arc<Self>) -> Vec<RestoreJob> {
        let mut g = self.lock();
        debug_assert_eq!(g.schema_state, TableSchemaState::DataDone);
        let jobs: Vec<_> = g.index_job_list.drain(..).collect();
        if jobs.is_empty() {
            g.schema_state = TableSchemaState::AllDone;
            drop(g);
            self.notify.notify_waiters();
        } else {
            g.schema_state = TableSchemaState::IndexEnqueued;
            g.index_remaining = jobs.len();
        }
        jobs
    }

    /// Index worker completing one job. Transitions to `ALL_DONE` once the
    /// last buffered index job for this table finishes (spec.md §4.6).
    pub fn complete_index_job(&self) {
        let mut g = self.lock();
        g.index_remaining = g.index_remaining.saturating_sub(1);
        if g.index_remaining == 0 && g.schema_state == TableSchemaState::IndexEnqueued {
            g.schema_state = TableSchemaState::AllDone;
            drop(g);
            self.notify.notify_waiters();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Owns every descriptor. `table_order` is the slow-path fallback scan list
/// (spec.md §4.2 step 3), kept in discovery order for fairness; it is the
/// `conf.table_list_mutex` of the lock-order list in spec.md §5.
pub struct TableRegistry {
    databases: Mutex<HashMap<String, Arc<DatabaseDescriptor>>>,
    tables: Mutex<HashMap<(String, String), Arc<TableDescriptor>>>,
    table_order: Mutex<Vec<Arc<TableDescriptor>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
            tables: Mutex::new(HashMap::new()),
            table_order: Mutex::new(Vec::new()),
        }
    }

    pub fn get_or_create_database(&self, name: &str) -> Arc<DatabaseDescriptor> {
        let mut dbs = self.databases.lock().unwrap();
        dbs.entry(name.to_string())
            .or_insert_with(|| Arc::new(DatabaseDescriptor::new(name.to_string())))
            .clone()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create_table(
        &self,
        database: Arc<DatabaseDescriptor>,
        source_table_name: &str,
        target_table_name: &str,
        is_view: bool,
        is_sequence: bool,
        no_data: bool,
        max_threads: u32,
    ) -> Arc<TableDescriptor> {
        let key = (database.target_name.clone(), target_table_name.to_string());
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.get(&key) {
            return existing.clone();
        }
        let table = Arc::new(TableDescriptor::new(
            database,
            source_table_name.to_string(),
            target_table_name.to_string(),
            is_view,
            is_sequence,
            no_data,
            max_threads,
        ));
        tables.insert(key, table.clone());
        self.table_order.lock().unwrap().push(table.clone());
        table
    }

    /// Snapshot of discovery order, used by the dispatcher's fallback scan and by
    /// the forced refresh after `FILE_TYPE_ENDED`.
    pub fn snapshot_tables(&self) -> Vec<Arc<TableDescriptor>> {
        self.table_order.lock().unwrap().clone()
    }

    pub fn all_databases(&self) -> Vec<Arc<DatabaseDescriptor>> {
        self.databases.lock().unwrap().values().cloned().collect()
    }

    /// `true` once every table has reached `DATA_DONE` or later. Used by the
    /// dispatcher to decide drain-complete (spec.md §4.2 step 4).
    pub fn all_tables_at_least(&self, state: TableSchemaState) -> bool {
        self.table_order
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.schema_state() >= state)
    }

    pub fn table_count(&self) -> usize {
        self.table_order.lock().unwrap().len()
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}
