//! Plain data types shared by the registry, schema pipeline, and workers.
//!
//! Kept free of synchronization concerns on purpose: `registry.rs` is where the
//! mutex/notify wiring lives, this module only defines what it wraps.

use std::path::PathBuf;

/// Compression applied to a dump file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

/// Lifecycle state of a database descriptor (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DbSchemaState {
    NotFound,
    NotCreated,
    Creating,
    Created,
}

/// Lifecycle state of a table descriptor (spec.md §3).
///
/// Declaration order doubles as the monotonic transition order so `<`/`>=`
/// comparisons express "has reached at least this stage". `Failed` is the
/// explicit terminal-failure state spec.md §9's open question asks for, kept
/// separate from `AllDone` rather than overloading it with a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TableSchemaState {
    NotFound,
    NotFound2,
    NotCreated,
    Creating,
    Created,
    DataDone,
    IndexEnqueued,
    AllDone,
    Failed,
}

/// One unit of restore work drawn from the dump.
#[derive(Debug, Clone)]
pub enum RestoreJob {
    CreateDatabase {
        database: String,
    },
    CreateTable {
        sql_file: PathBuf,
    },
    CreateSequence {
        sql_file: PathBuf,
    },
    CreateIndex {
        sql_file: PathBuf,
    },
    RestoreData {
        file: PathBuf,
        offset: u64,
        compression: Compression,
    },
    AlterPostData {
        sql_file: PathBuf,
    },
    /// Sentinel pushed exactly `pool_size` times per worker pool on termination.
    Shutdown,
}

impl RestoreJob {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, RestoreJob::Shutdown)
    }
}

/// Pre-load purge behavior when `overwrite_tables` is set (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurgeMode {
    Fail,
    Drop,
    #[default]
    Truncate,
    None,
    Skip,
}
