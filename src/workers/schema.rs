//! Schema Workers (spec.md §4.5)
//!
//! Drain the schema-job queue. For each job: mark the table `CREATING`,
//! execute the DDL on this worker's own connection, then mark `CREATED`
//! (broadcast + ready-queue enqueue) on success, or push the job itself back
//! into the retry queue on failure.

use std::io::Read;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};

use crate::config::PurgeConfig;
use crate::db::DbConnection;
use crate::model::{PurgeMode, RestoreJob, TableSchemaState};
use crate::ready_queue::ReadyQueue;
use crate::registry::DatabaseDescriptor;
use crate::scheduler::Scheduler;
use crate::schema_pipeline::{SchemaJobQueue, SchemaJobReceiver, SchemaWorkItem};
use crate::sql;

/// Runs until the schema-job queue is closed (i.e. every `SchemaJobQueue`
/// clone has been dropped, which happens once the producer side and the
/// retry-requeue task both finish).
/// `jobs` is shared across every schema worker in the pool via a
/// `tokio::sync::Mutex`: `mpsc::UnboundedReceiver` has exactly one consumer,
/// so fanning it out to a worker pool means serializing the "wait for the
/// next item" step through a lock rather than giving each worker its own
/// channel end.
pub async fn run(
    worker_id: usize,
    mut conn: Box<dyn DbConnection>,
    jobs: Arc<AsyncMutex<SchemaJobReceiver>>,
    scheduler: Arc<Scheduler>,
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
        execute_schema_job(
            worker_id,
            &mut *conn,
            item,
            &scheduler.schema_queue,
            &scheduler.ready_queue,
            &scheduler.control_tx,
            &scheduler.config.purge,
        )
        .await;
    }
    info!(worker_id, "schema worker exiting");
}

async fn execute_schema_job(
    worker_id: usize,
    conn: &mut dyn DbConnection,
    item: SchemaWorkItem,
    schema_queue: &SchemaJobQueue,
    ready_queue: &ReadyQueue,
    control_tx: &crate::control_bus::ControlSender,
    purge: &PurgeConfig,
) {
    let SchemaWorkItem { table, job, attempt } = item;

    if let RestoreJob::CreateDatabase { database } = &job {
        match conn.execute(&format!("CREATE DATABASE IF NOT EXISTS `{database}`")).await {
            Ok(_) => table.database.mark_created_and_drain(schema_queue),
            Err(err) => {
                error!(worker_id, %database, "CREATE DATABASE failed: {err}");
                schema_queue.retry_after_failure(
                    SchemaWorkItem {
                        table,
                        job: RestoreJob::CreateDatabase {
                            database: database.clone(),
                        },
                        attempt,
                    },
                    err,
                );
            }
        }
        return;
    }

    table.mark_creating();

    let sql_file = match &job {
        RestoreJob::CreateTable { sql_file }
        | RestoreJob::CreateSequence { sql_file }
        | RestoreJob::CreateIndex { sql_file }
        | RestoreJob::AlterPostData { sql_file } => sql_file.clone(),
        RestoreJob::CreateDatabase { .. } | RestoreJob::RestoreData { .. } | RestoreJob::Shutdown => {
            unreachable!("schema worker only handles DDL jobs")
        }
    };

    let statements = match read_statements(&sql_file) {
        Ok(s) => s,
        Err(e) => {
            error!(worker_id, file = %sql_file.display(), "failed to read schema file: {e}");
            schema_queue.retry_after_failure(
                SchemaWorkItem { table, job, attempt },
                crate::error::RestoreError::TransientConnection {
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    // Index/ALTER jobs are buffered until DATA_DONE rather than run now; the
    // dispatcher dequeues them via `TableDescriptor::take_index_jobs_and_advance`.
    if matches!(job, RestoreJob::CreateIndex { .. } | RestoreJob::AlterPostData { .. }) {
        for stmt in statements {
            table.push_index_job(match &job {
                RestoreJob::CreateIndex { .. } => RestoreJob::CreateIndex {
                    sql_file: sql_file.clone(),
                },
                _ => RestoreJob::AlterPostData {
                    sql_file: sql_file.clone(),
                },
            });
            let _ = stmt; // one buffered job per file is enough; statements run together when dispatched.
            break;
        }
        return;
    }

    // Pre-load purge (spec.md §6 `overwrite_tables`/`purge_mode`), real tables only.
    if matches!(job, RestoreJob::CreateTable { .. }) && purge.overwrite_tables {
        if let Err(err) = run_purge(conn, &table.target_table_name, purge.purge_mode).await {
            error!(worker_id, table = %table.target_table_name, "purge failed: {err}");
            schema_queue.retry_after_failure(SchemaWorkItem { table, job, attempt }, err);
            return;
        }
    }

    for stmt in &statements {
        if let Err(err) = conn.execute(stmt).await {
            error!(worker_id, table = %table.target_table_name, "DDL failed: {err}");
            schema_queue.retry_after_failure(SchemaWorkItem { table, job, attempt }, err);
            return;
        }
    }

    if matches!(job, RestoreJob::CreateSequence { .. }) || table.is_view || table.is_sequence {
        table.mark_all_done_no_data();
    } else {
        table.mark_created(ready_queue, control_tx);
    }
    debug_assert_ne!(table.schema_state(), TableSchemaState::NotCreated);
}

/// `DROP`/`TRUNCATE` "table does not exist" failures are benign: the table
/// simply hasn't been created by a previous run, so proceed straight to the
/// CREATE path (spec.md §6).
async fn run_purge(
    conn: &mut dyn DbConnection,
    table: &str,
    mode: PurgeMode,
) -> Result<(), crate::error::RestoreError> {
    let stmt = match mode {
        PurgeMode::None | PurgeMode::Skip => return Ok(()),
        PurgeMode::Drop | PurgeMode::Fail => format!("DROP TABLE IF EXISTS `{table}`"),
        PurgeMode::Truncate => format!("TRUNCATE TABLE `{table}`"),
    };
    match conn.execute(&stmt).await {
        Ok(_) => Ok(()),
        Err(err) if mode == PurgeMode::Truncate && matches!(err, crate::error::RestoreError::ObjectMissing { .. }) => {
            Ok(())
        }
        Err(err) if mode == PurgeMode::Fail => Err(err),
        Err(_) => Ok(()),
    }
}

fn read_statements(path: &std::path::Path) -> std::io::Result<Vec<String>> {
    let mut contents = String::new();
    std::fs::File::open(path)?.read_to_string(&mut contents)?;
    Ok(sql::split_statements(&contents))
}

/// Unused directly, kept for symmetry with `workers::data`: a placeholder
/// table representing "this database's CREATE DATABASE job" so
/// `SchemaJobQueue` can carry it through the same `SchemaWorkItem` shape as
/// table DDL. See `dispatcher`/`main` wiring for how the scanner emits it.
pub fn database_placeholder_table(
    registry: &crate::registry::TableRegistry,
    db: &std::sync::Arc<DatabaseDescriptor>,
) -> std::sync::Arc<crate::registry::TableDescriptor> {
    registry.get_or_create_table(db.clone(), "", "__create_database__", false, false, true, 1)
}
