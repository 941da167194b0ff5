//! Schema Pipeline & Per-Database Buffering (spec.md §4.3)
//!
//! Orders schema work so a table's CREATE never precedes its database's CREATE,
//! even with concurrent producers: a schema job for a not-yet-`CREATED`
//! database is buffered on `DatabaseDescriptor::pending_table_queue` rather than
//! pushed to the schema-job queue directly. `DatabaseDescriptor::enqueue_or_buffer`
//! (in `registry.rs`) is the decision point; this module is the queue schema
//! workers drain, plus the retry path for failed DDL (spec.md §4.5, §7).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::RestoreError;
use crate::model::RestoreJob;
use crate::registry::TableDescriptor;

/// Bounded retry budget for a single schema job (spec.md §7: "After retry
/// policy exhausts, log and continue").
const MAX_SCHEMA_RETRIES: u32 = 10;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// One item handed to a schema worker: the table the DDL targets, the job
/// itself, and how many times it has already been retried.
#[derive(Clone)]
pub struct SchemaWorkItem {
    pub table: Arc<TableDescriptor>,
    pub job: RestoreJob,
    pub attempt: u32,
}

#[derive(Clone)]
pub struct SchemaJobQueue {
    tx: mpsc::UnboundedSender<SchemaWorkItem>,
}

pub struct SchemaJobReceiver {
    rx: mpsc::UnboundedReceiver<SchemaWorkItem>,
}

impl SchemaJobQueue {
    pub fn push(&self, table: Arc<TableDescriptor>, job: RestoreJob) {
        self.push_item(SchemaWorkItem { table, job, attempt: 0 });
    }

    pub fn push_item(&self, item: SchemaWorkItem) {
        // The receiver is only dropped at shutdown, after every schema worker
        // has exited; a send failure past that point is a harmless no-op.
        let _ = self.tx.send(item);
    }

    /// §4.5 on-failure path: push the *job itself* back (never a sentinel),
    /// with its attempt count bumped, after a backoff sleep. Gives up and
    /// marks the table terminally failed once `MAX_SCHEMA_RETRIES` is hit
    /// (spec.md §9's explicit-failed-state open question).
    pub fn retry_after_failure(&self, mut item: SchemaWorkItem, err: RestoreError) {
        item.table.record_schema_failure(err);
        item.attempt += 1;
        if item.attempt > MAX_SCHEMA_RETRIES {
            warn!(
                table = %item.table.target_table_name,
                attempts = item.attempt,
                "schema job retry budget exhausted; marking table failed"
            );
            item.table.mark_failed(RestoreError::RetryExhausted {
                attempts: item.attempt,
                last: Box::new(RestoreError::Fatal {
                    message: "schema DDL did not succeed within retry budget".into(),
                }),
            });
            return;
        }
        let delay = backoff_for_attempt(item.attempt);
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.push_item(item);
        });
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let millis = BASE_BACKOFF.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

impl SchemaJobReceiver {
    pub async fn recv(&mut self) -> Option<SchemaWorkItem> {
        self.rx.recv().await
    }
}

pub fn channel() -> (SchemaJobQueue, SchemaJobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SchemaJobQueue { tx }, SchemaJobReceiver { rx })
}
