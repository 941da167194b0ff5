//! Index Workers (spec.md §4.6)
//!
//! Drain `CreateIndex`/`AlterPostData` jobs the schema pipeline buffered on each
//! table and released once that table reached `DATA_DONE`
//! (`Scheduler::dispatch_index_jobs`). A table with no index jobs never crosses
//! this channel at all; the pool still needs its `Shutdown` sentinels even then
//! (spec.md §4.6 "pool_size shutdown sentinels regardless of whether any table
//! produced index work").

use std::io::Read;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, info};

use crate::control_bus::WorkItem;
use crate::db::DbConnection;
use crate::model::RestoreJob;
use crate::retry::execute_with_retry;
use crate::sql;

/// `jobs` is shared across the index worker pool the same way schema workers
/// share their queue (`workers::schema::run`) — one `mpsc::Receiver`, fanned
/// out via a `tokio::sync::Mutex` rather than one channel per worker.
pub async fn run(
    worker_id: usize,
    mut conn: Box<dyn DbConnection>,
    jobs: Arc<AsyncMutex<mpsc::Receiver<WorkItem>>>,
) {
    loop {
        let item = {
            let mut guard = jobs.lock().await;
            guard.recv().await
        };
        let Some(item) = item else { break };
        if item.job.is_shutdown() {
            break;
        }
        execute_index_job(worker_id, &mut *conn, item).await;
    }
    info!(worker_id, "index worker exiting");
}

async fn execute_index_job(worker_id: usize, conn: &mut dyn DbConnection, item: WorkItem) {
    let WorkItem { table, job } = item;
    let label = format!("{}.{}", table.database.target_name, table.target_table_name);

    let sql_file = match &job {
        RestoreJob::CreateIndex { sql_file } | RestoreJob::AlterPostData { sql_file } => sql_file,
        other => {
            error!(worker_id, ?other, "index worker received non-index job");
            table.complete_index_job();
            return;
        }
    };

    let statements = match read_statements(sql_file) {
        Ok(s) => s,
        Err(e) => {
            error!(worker_id, file = %sql_file.display(), "failed to read index file: {e}");
            table.record_schema_failure(crate::error::RestoreError::TransientConnection {
                message: e.to_string(),
            });
            table.complete_index_job();
            return;
        }
    };

    for stmt in &statements {
        if let Err(err) = execute_with_retry(conn, &label, stmt).await {
            error!(worker_id, table = %label, "index DDL failed: {err}");
            table.record_schema_failure(err);
            break;
        }
    }

    table.complete_index_job();
}

fn read_statements(path: &std::path::Path) -> std::io::Result<Vec<String>> {
    let mut contents = String::new();
    std::fs::File::open(path)?.read_to_string(&mut contents)?;
    Ok(sql::split_statements(&contents))
}
