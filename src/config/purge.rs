//! Pre-load purge behavior (spec.md §6 `overwrite_tables`/`purge_mode`).

use serde::Deserialize;

use crate::model::PurgeMode;

#[derive(Debug, Clone)]
pub struct PurgeConfig {
    pub overwrite_tables: bool,
    pub purge_mode: PurgeMode,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            overwrite_tables: true,
            purge_mode: PurgeMode::Truncate,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FilePurgeConfig {
    pub overwrite_tables: Option<bool>,
    pub purge_mode: Option<String>,
}

impl PurgeConfig {
    pub fn from_file(file: Option<FilePurgeConfig>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else { return defaults };
        let purge_mode = file
            .purge_mode
            .as_deref()
            .map(parse_purge_mode)
            .unwrap_or(defaults.purge_mode);
        Self {
            overwrite_tables: file.overwrite_tables.unwrap_or(defaults.overwrite_tables),
            purge_mode,
        }
    }
}

pub fn parse_purge_mode_pub(s: &str) -> PurgeMode {
    parse_purge_mode(s)
}

fn parse_purge_mode(s: &str) -> PurgeMode {
    match s.to_ascii_uppercase().as_str() {
        "FAIL" => PurgeMode::Fail,
        "DROP" => PurgeMode::Drop,
        "TRUNCATE" => PurgeMode::Truncate,
        "NONE" => PurgeMode::None,
        "SKIP" => PurgeMode::Skip,
        other => {
            tracing::warn!(mode = other, "unknown purge_mode, falling back to TRUNCATE");
            PurgeMode::Truncate
        }
    }
}
