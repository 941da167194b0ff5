//! Configuration for the restore dispatcher (spec.md §6, `SPEC_FULL.md` §2 item 12).
//!
//! Configuration is loaded in order of precedence:
//! 1. CLI flags (highest priority)
//! 2. Environment variables
//! 3. Config file (`~/.config/restored/config.toml`)
//! 4. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod connection;
mod errors;
mod limits;
mod logging;
mod purge;

pub use errors::{ErrorsConfig, FileErrorsConfig};
pub use limits::{FileLimits, Limits};
pub use logging::{FileLogging, LoggingConfig};
pub use purge::{FilePurgeConfig, PurgeConfig};

use crate::cli::Cli;
use crate::db::ConnectOptions;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ─────────────────────────────────────────────────────────────────────────────
// Application configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the logical dump to restore.
    pub dump_dir: PathBuf,

    pub limits: Limits,
    pub purge: PurgeConfig,
    pub errors: ErrorsConfig,
    pub logging: LoggingConfig,
    pub connection: ConnectOptions,

    /// Skip the data phase entirely; still sends index-worker shutdown
    /// sentinels (spec.md §6).
    pub no_data: bool,
    /// Skip DDL execution but still mark database/table `CREATED` so the data
    /// phase can dispatch (spec.md §6, §9 two-phase loading atomicity).
    pub no_schemas: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dump_dir: PathBuf::from("."),
            limits: Limits::default(),
            purge: PurgeConfig::default(),
            errors: ErrorsConfig::default(),
            logging: LoggingConfig::default(),
            connection: connection::from_file(None),
            no_data: false,
            no_schemas: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub dump_dir: Option<String>,
    pub no_data: Option<bool>,
    pub no_schemas: Option<bool>,

    pub limits: Option<FileLimits>,
    pub purge: Option<FilePurgeConfig>,
    pub errors: Option<FileErrorsConfig>,
    pub logging: Option<FileLogging>,
    pub connection: Option<connection::FileConnection>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// `~/.config/restored/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("restored").join("config.toml"))
    }

    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("config error: failed to parse {}: {e}", path.display());
                std::process::exit(1);
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("config error: cannot read {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }

    /// Layer file config under env vars under CLI flags, per the module-level
    /// precedence doc-comment.
    pub fn from_cli(cli: &Cli) -> Self {
        let file = Self::load_file_config();

        let dump_dir = cli
            .dump_dir
            .clone()
            .or_else(|| std::env::var("RESTORED_DUMP_DIR").ok().map(PathBuf::from))
            .or_else(|| file.dump_dir.clone().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut limits = Limits::from_file(file.limits);
        if let Some(threads) = cli.threads {
            limits.threads = threads;
        }
        if let Some(n) = cli.max_threads_for_schema_creation {
            limits.max_threads_for_schema_creation = n;
        }
        if let Some(n) = cli.max_threads_for_index_creation {
            limits.max_threads_for_index_creation = n;
        }
        if let Some(n) = cli.max_decompressors {
            limits.max_decompressors = n;
        }

        let mut purge = PurgeConfig::from_file(file.purge);
        if cli.overwrite_tables {
            purge.overwrite_tables = true;
        }
        if let Some(mode) = &cli.purge_mode {
            purge.purge_mode = purge::parse_purge_mode_pub(mode);
        }

        let mut errors = ErrorsConfig::from_file(file.errors);
        errors.ignore_errors.extend(cli.ignore_errors.iter().copied());

        let mut logging = LoggingConfig::from_file(file.logging);
        if let Ok(level) = std::env::var("RUST_LOG") {
            logging.level = level;
        }
        if let Some(level) = &cli.log_level {
            logging.level = level.clone();
        }

        let mut connection = connection::from_file(file.connection);
        if let Some(host) = &cli.host {
            connection.host = host.clone();
        }
        if let Some(port) = cli.port {
            connection.port = port;
        }
        if let Some(user) = &cli.user {
            connection.user = user.clone();
        }

        Self {
            dump_dir,
            limits,
            purge,
            errors,
            logging,
            connection,
            no_data: cli.no_data || file.no_data.unwrap_or(false),
            no_schemas: cli.no_schemas || file.no_schemas.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert!(config.limits.max_decompressors <= 32);
        assert_eq!(config.purge.overwrite_tables, true);
    }
}
