//! Data Workers (spec.md §4.4)
//!
//! Each worker owns one connection for its lifetime. It asks the dispatcher
//! for work over the control bus, waits on the table's schema barrier as a
//! defensive measure, executes the job with retry-on-`ObjectMissing`, reports
//! completion back into the registry, then asks for the next job.

use std::io::Read;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::control_bus::{ControlEvent, ControlSender, WorkItem};
use crate::db::DbConnection;
use crate::decompress::DecompressionPool;
use crate::model::{Compression, RestoreJob};
use crate::ready_queue::ReadyQueue;
use crate::retry::execute_with_retry;
use crate::scheduler::Scheduler;
use crate::sql;

pub async fn run(
    worker_id: usize,
    mut conn: Box<dyn DbConnection>,
    scheduler: Arc<Scheduler>,
    decompression: Arc<DecompressionPool>,
) {
    loop {
        let (reply_tx, reply_rx) = oneshot::channel();
        if scheduler
            .control_tx
            .send(ControlEvent::RequestJob(reply_tx))
            .is_err()
        {
            break;
        }

        // The dispatcher only replies `None` once it has declared drain
        // complete; until then it parks this reply and answers later via
        // `WakeData`/`FileTypeEnded`, so this await can block for a while.
        let item = match reply_rx.await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => break,
        };

        if item.job.is_shutdown() {
            break;
        }

        run_one_job(worker_id, &mut *conn, &scheduler, &decompression, item).await;
    }

    info!(worker_id, "data worker exiting");
}

async fn run_one_job(
    worker_id: usize,
    conn: &mut dyn DbConnection,
    scheduler: &Arc<Scheduler>,
    decompression: &DecompressionPool,
    item: WorkItem,
) {
    let WorkItem { table, job } = item;

    // Defensive barrier (spec.md §4.4 step 2): normally a no-op since the
    // dispatcher only hands out jobs for CREATED tables.
    table.wait_until_created().await;

    let label = format!("{}.{}", table.database.target_name, table.target_table_name);

    let result = match &job {
        RestoreJob::RestoreData {
            file,
            compression,
            ..
        } => load_data_file(conn, decompression, &label, file, *compression).await,
        other => {
            warn!(worker_id, ?other, "data worker received non-data job");
            Ok(0)
        }
    };

    match result {
        Ok(rows) => {
            scheduler.stats.rows_loaded.fetch_add(rows as usize, std::sync::atomic::Ordering::Relaxed);
        }
        Err(err) => {
            error!(worker_id, table = %label, "data load failed: {err}");
            // Anything surfacing here already ran the gauntlet in
            // `execute_with_retry` (retryable errors are retried to exhaustion,
            // `IgnorableByConfig` is turned into `Ok(0)`), so it's `Fatal` or
            // `RetryExhausted` — both terminal for this table.
            table.mark_failed(err);
        }
    }

    complete_job(&table, scheduler);
}

async fn load_data_file(
    conn: &mut dyn DbConnection,
    decompression: &DecompressionPool,
    label: &str,
    file: &std::path::Path,
    compression: Compression,
) -> Result<u64, crate::error::RestoreError> {
    let contents = if compression == Compression::None {
        let mut buf = String::new();
        std::fs::File::open(file)
            .and_then(|mut f| f.read_to_string(&mut buf))
            .map_err(|e| crate::error::RestoreError::TransientConnection {
                message: e.to_string(),
            })?;
        buf
    } else {
        let mut stream = decompression.open(file, compression).await?;
        let mut buf = String::new();
        use tokio::io::AsyncReadExt;
        stream
            .file
            .read_to_string(&mut buf)
            .await
            .map_err(|e| crate::error::RestoreError::TransientConnection {
                message: e.to_string(),
            })?;
        stream.close().await?;
        buf
    };

    let mut total_rows = 0u64;
    for stmt in sql::split_statements(&contents) {
        total_rows += execute_with_retry(conn, label, &stmt).await?;
    }
    Ok(total_rows)
}

/// Data worker finishing a job (spec.md §4.4 step 5): decrement counters,
/// re-enqueue the table if it still has jobs, then report ready for the next
/// request.
fn complete_job(table: &Arc<crate::registry::TableDescriptor>, scheduler: &Arc<Scheduler>) {
    let mut g = table.lock();
    g.current_threads = g.current_threads.saturating_sub(1);
    table.remaining_jobs.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    table.try_enqueue_ready(&mut g, &scheduler.ready_queue, &scheduler.control_tx);
    drop(g);
}

/// Signature kept distinct from `complete_job` for workers that need direct
/// access to the ready queue/control sender without a full `Scheduler`
/// (used only in unit tests).
#[allow(dead_code)]
fn complete_job_raw(
    table: &Arc<crate::registry::TableDescriptor>,
    ready_queue: &ReadyQueue,
    control_tx: &ControlSender,
) {
    let mut g = table.lock();
    g.current_threads = g.current_threads.saturating_sub(1);
    table.remaining_jobs.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    table.try_enqueue_ready(&mut g, ready_queue, control_tx);
}
