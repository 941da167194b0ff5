//! Logging level configuration (`SPEC_FULL.md` §2 item 13).

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string, e.g. `"info"`, `"restored=debug,sqlx=warn"`.
    pub level: String,
    /// Emit newline-delimited JSON instead of the human-readable formatter.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl LoggingConfig {
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else { return defaults };
        Self {
            level: file.level.unwrap_or(defaults.level),
            json: file.json.unwrap_or(defaults.json),
        }
    }
}
