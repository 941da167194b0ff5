//! Structured logging init (`SPEC_FULL.md` §2 item 13).
//!
//! Same precedence as the layered config: `RUST_LOG` env var (if set) wins
//! over the resolved `config.logging.level`, which itself already folds in
//! the config file and CLI `--log-level` flag (see `config/mod.rs`). There is
//! no TUI in this crate, so logs go to stdout/stderr via
//! `tracing_subscriber::fmt` rather than an in-memory ring buffer.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber. Must be called exactly once,
/// before any worker task is spawned — initializing it concurrently from two
/// tasks is undefined behavior in `tracing-subscriber`, the same
/// lazy-initialization hazard spec.md §9 calls out for mutexes and semaphores.
pub fn init(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = fmt().with_env_filter(filter).with_target(true);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
