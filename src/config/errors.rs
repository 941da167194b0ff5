//! `ignore_errors` set (spec.md §6): vendor error codes to treat as success.
//! Kept as a `HashSet` so the `classify()` lookup in `error.rs` stays O(1).

use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Clone, Default)]
pub struct ErrorsConfig {
    pub ignore_errors: HashSet<i32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileErrorsConfig {
    #[serde(default)]
    pub ignore_errors: Vec<i32>,
}

impl ErrorsConfig {
    pub fn from_file(file: Option<FileErrorsConfig>) -> Self {
        Self {
            ignore_errors: file.map(|f| f.ignore_errors.into_iter().collect()).unwrap_or_default(),
        }
    }
}
