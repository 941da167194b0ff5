//! Thread/concurrency limits (spec.md §6 "Configuration options recognized").

use serde::Deserialize;

/// Worker pool sizes and the decompression semaphore capacity.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Data worker pool size.
    pub threads: u32,
    pub max_threads_for_schema_creation: u32,
    pub max_threads_for_index_creation: u32,
    /// Decompression subprocess semaphore capacity; default `min(threads, 32)`.
    pub max_decompressors: usize,
    /// Lazy table-list rebuild threshold (spec.md §6); forced on `FILE_TYPE_ENDED`
    /// regardless of this counter.
    pub table_refresh_interval: u32,
}

impl Default for Limits {
    fn default() -> Self {
        let threads = 8;
        Self {
            threads,
            max_threads_for_schema_creation: 4,
            max_threads_for_index_creation: 4,
            max_decompressors: (threads as usize).min(32),
            table_refresh_interval: 50,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLimits {
    pub threads: Option<u32>,
    pub max_threads_for_schema_creation: Option<u32>,
    pub max_threads_for_index_creation: Option<u32>,
    pub max_decompressors: Option<usize>,
    pub table_refresh_interval: Option<u32>,
}

impl Limits {
    pub fn from_file(file: Option<FileLimits>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else { return defaults };
        let threads = file.threads.unwrap_or(defaults.threads);
        let max_decompressors = file
            .max_decompressors
            .unwrap_or_else(|| (threads as usize).min(32));
        Self {
            threads,
            max_threads_for_schema_creation: file
                .max_threads_for_schema_creation
                .unwrap_or(defaults.max_threads_for_schema_creation),
            max_threads_for_index_creation: file
                .max_threads_for_index_creation
                .unwrap_or(defaults.max_threads_for_index_creation),
            max_decompressors,
            table_refresh_interval: file
                .table_refresh_interval
                .unwrap_or(defaults.table_refresh_interval),
        }
    }
}
