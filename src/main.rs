//! Concurrent restore dispatcher — entry point.
//!
//! Parses configuration, scans the dump directory, and wires the registry,
//! schema pipeline, ready queue, dispatcher, and the three worker pools
//! together. The dispatcher is the only task that owns cross-cutting
//! scheduling state; everything else talks to it over the control bus
//! (`control_bus.rs`) or through `Scheduler`'s lock-protected fields.

mod cli;
mod config;
mod control_bus;
mod db;
mod decompress;
mod dispatcher;
mod error;
mod logging;
mod model;
mod progress;
mod ready_queue;
mod registry;
mod retry;
mod scanner;
mod scheduler;
mod schema_pipeline;
mod sql;
#[cfg(test)]
mod tests;
mod workers;

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, info};

use cli::Cli;
use config::Config;
use control_bus::{ControlEvent, WorkItem};
use db::{ConnectOptions, DbConnection, MySqlDbConnection};
use decompress::DecompressionPool;
use model::{RestoreJob, TableSchemaState};
use registry::TableDescriptor;
use scanner::{DirScanner, DumpScanner, FileKind, FileRecord};
use scheduler::Scheduler;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli);

    if cli::handle_cli(&cli, &config) {
        return ExitCode::SUCCESS;
    }

    logging::init(&config.logging);
    info!(dump_dir = %config.dump_dir.display(), "starting restore");

    let (control_tx, control_rx) = control_bus::channel();
    let (schema_queue, schema_rx) = schema_pipeline::channel();
    let (index_tx, index_rx) = mpsc::channel::<WorkItem>(256);

    let scheduler = Arc::new(Scheduler::new(
        config.clone(),
        control_tx.clone(),
        index_tx,
        schema_queue,
    ));
    let decompression = Arc::new(DecompressionPool::new(
        config.limits.max_decompressors,
        std::env::temp_dir(),
    ));
    let ignore_errors: Arc<HashSet<i32>> = Arc::new(config.errors.ignore_errors.clone());

    let dispatcher_handle = tokio::spawn(dispatcher::run(Arc::clone(&scheduler), control_rx));
    let progress_handle = tokio::spawn(progress::run(Arc::clone(&scheduler)));

    let schema_rx = Arc::new(AsyncMutex::new(schema_rx));
    let index_rx = Arc::new(AsyncMutex::new(index_rx));

    let mut schema_handles = Vec::new();
    for worker_id in 0..config.limits.max_threads_for_schema_creation {
        match connect(&config.connection, Arc::clone(&ignore_errors)).await {
            Ok(conn) => schema_handles.push(tokio::spawn(workers::schema::run(
                worker_id as usize,
                conn,
                Arc::clone(&schema_rx),
                Arc::clone(&scheduler),
            ))),
            Err(e) => error!(worker_id, "schema worker failed to connect: {e}"),
        }
    }

    let mut index_handles = Vec::new();
    for worker_id in 0..config.limits.max_threads_for_index_creation {
        match connect(&config.connection, Arc::clone(&ignore_errors)).await {
            Ok(conn) => index_handles.push(tokio::spawn(workers::index::run(
                worker_id as usize,
                conn,
                Arc::clone(&index_rx),
            ))),
            Err(e) => error!(worker_id, "index worker failed to connect: {e}"),
        }
    }

    let mut data_handles = Vec::new();
    if !config.no_data {
        for worker_id in 0..config.limits.threads {
            match connect(&config.connection, Arc::clone(&ignore_errors)).await {
                Ok(conn) => data_handles.push(tokio::spawn(workers::data::run(
                    worker_id as usize,
                    conn,
                    Arc::clone(&scheduler),
                    Arc::clone(&decompression),
                ))),
                Err(e) => error!(worker_id, "data worker failed to connect: {e}"),
            }
        }
    }

    if let Err(e) = produce_jobs(&scheduler) {
        error!("failed to scan dump directory: {e}");
    }

    let _ = control_tx.send(ControlEvent::SchemaPhaseEnded);
    let _ = control_tx.send(ControlEvent::FileTypeEnded);

    for handle in data_handles {
        let _ = handle.await;
    }

    let shutdown_table = shutdown_placeholder(&scheduler);

    for _ in 0..config.limits.max_threads_for_index_creation {
        let _ = scheduler
            .index_tx
            .send(WorkItem {
                table: Arc::clone(&shutdown_table),
                job: RestoreJob::Shutdown,
            })
            .await;
    }
    for handle in index_handles {
        let _ = handle.await;
    }

    for _ in 0..config.limits.max_threads_for_schema_creation {
        scheduler
            .schema_queue
            .push(Arc::clone(&shutdown_table), RestoreJob::Shutdown);
    }
    for handle in schema_handles {
        let _ = handle.await;
    }

    let _ = control_tx.send(ControlEvent::Shutdown);
    let _ = dispatcher_handle.await;
    let _ = progress_handle.await;

    let failed = scheduler
        .registry
        .snapshot_tables()
        .iter()
        .any(|t| t.schema_state() == TableSchemaState::Failed);

    if failed {
        error!("restore finished with one or more failed tables");
        ExitCode::FAILURE
    } else {
        info!("restore finished successfully");
        ExitCode::SUCCESS
    }
}

async fn connect(
    options: &ConnectOptions,
    ignore_errors: Arc<HashSet<i32>>,
) -> Result<Box<dyn DbConnection>, error::RestoreError> {
    let conn = MySqlDbConnection::connect(options.clone(), ignore_errors).await?;
    Ok(Box::new(conn))
}

/// A dedicated, never-dispatched table descriptor to carry `Shutdown`
/// sentinels through the same `WorkItem`/`SchemaWorkItem` shape as real jobs
/// (`workers::schema::database_placeholder_table` does the same for
/// `CREATE DATABASE`).
fn shutdown_placeholder(scheduler: &Arc<Scheduler>) -> Arc<TableDescriptor> {
    let db = scheduler.registry.get_or_create_database("__shutdown__");
    scheduler
        .registry
        .get_or_create_table(db, "", "__shutdown__", false, false, true, 1)
}

fn produce_jobs(scheduler: &Arc<Scheduler>) -> std::io::Result<()> {
    let scanner = DirScanner::new(&scheduler.config.dump_dir);
    for record in scanner.scan()? {
        route_record(&record, scheduler);
    }
    Ok(())
}

/// Turns one discovered dump file into registry state and/or a queued job
/// (spec.md §4.3 enqueue-discipline entry points). `no_schemas` skips DDL
/// execution while still advancing tables/databases to `CREATED` so the data
/// phase can proceed (spec.md §6, §9).
fn route_record(record: &FileRecord, scheduler: &Arc<Scheduler>) {
    let config = &scheduler.config;
    let db = scheduler.registry.get_or_create_database(&record.database);
    let threads = config.limits.threads;

    match &record.kind {
        FileKind::DatabaseSchema => {
            if config.no_schemas {
                db.mark_created_and_drain(&scheduler.schema_queue);
            } else {
                let placeholder = workers::schema::database_placeholder_table(&scheduler.registry, &db);
                scheduler.schema_queue.push(
                    placeholder,
                    RestoreJob::CreateDatabase {
                        database: record.database.clone(),
                    },
                );
            }
        }

        FileKind::TableSchema { table } => {
            let t = scheduler
                .registry
                .get_or_create_table(db.clone(), table, table, false, false, false, threads);
            if config.no_schemas {
                t.mark_created(&scheduler.ready_queue, &scheduler.control_tx);
            } else {
                db.enqueue_or_buffer(
                    t,
                    RestoreJob::CreateTable {
                        sql_file: record.path.clone(),
                    },
                    &scheduler.schema_queue,
                );
            }
        }

        FileKind::ViewSchema { table } => {
            let t = scheduler
                .registry
                .get_or_create_table(db.clone(), table, table, true, false, true, 1);
            if config.no_schemas {
                t.mark_all_done_no_data();
            } else {
                db.enqueue_or_buffer(
                    t,
                    RestoreJob::CreateTable {
                        sql_file: record.path.clone(),
                    },
                    &scheduler.schema_queue,
                );
            }
        }

        FileKind::SequenceSchema { table } => {
            let t = scheduler
                .registry
                .get_or_create_table(db.clone(), table, table, false, true, true, 1);
            if config.no_schemas {
                t.mark_all_done_no_data();
            } else {
                db.enqueue_or_buffer(
                    t,
                    RestoreJob::CreateSequence {
                        sql_file: record.path.clone(),
                    },
                    &scheduler.schema_queue,
                );
            }
        }

        FileKind::TableIndex { table } => {
            if config.no_schemas {
                return;
            }
            let t = scheduler
                .registry
                .get_or_create_table(db.clone(), table, table, false, false, false, threads);
            db.enqueue_or_buffer(
                t,
                RestoreJob::CreateIndex {
                    sql_file: record.path.clone(),
                },
                &scheduler.schema_queue,
            );
        }

        FileKind::Data { table, .. } => {
            if config.no_data {
                return;
            }
            let t = scheduler
                .registry
                .get_or_create_table(db.clone(), table, table, false, false, false, threads);
            scheduler.enqueue_data_job(
                &t,
                RestoreJob::RestoreData {
                    file: record.path.clone(),
                    offset: 0,
                    compression: record.compression,
                },
            );
        }
    }
}
