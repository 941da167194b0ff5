//! CLI surface (spec.md §6, `SPEC_FULL.md` §2 item 11).
//!
//! Every flag here is optional: absence falls through to the config file, then
//! to env vars (where `clap`'s `env` feature applies), then to
//! [`crate::config::Config::default`]. See `config/mod.rs`'s precedence
//! doc-comment for the full layering order.

use std::path::PathBuf;

use clap::Parser;

use crate::config::VERSION;

#[derive(Parser, Debug)]
#[command(name = "restored")]
#[command(version = VERSION)]
#[command(about = "Concurrent restore dispatcher for a logical database dump", long_about = None)]
pub struct Cli {
    /// Directory containing the logical dump to restore.
    pub dump_dir: Option<PathBuf>,

    /// Data worker pool size.
    #[arg(long, env = "RESTORED_THREADS")]
    pub threads: Option<u32>,

    #[arg(long, env = "RESTORED_SCHEMA_THREADS")]
    pub max_threads_for_schema_creation: Option<u32>,

    #[arg(long, env = "RESTORED_INDEX_THREADS")]
    pub max_threads_for_index_creation: Option<u32>,

    /// Decompression subprocess semaphore capacity.
    #[arg(long, env = "RESTORED_MAX_DECOMPRESSORS")]
    pub max_decompressors: Option<usize>,

    /// Skip the data phase; still dispatches index-worker shutdown.
    #[arg(long)]
    pub no_data: bool,

    /// Skip DDL execution; tables/databases still reach `CREATED`.
    #[arg(long)]
    pub no_schemas: bool,

    /// Enable pre-load purge of existing tables.
    #[arg(long)]
    pub overwrite_tables: bool,

    /// One of FAIL, DROP, TRUNCATE, NONE, SKIP.
    #[arg(long)]
    pub purge_mode: Option<String>,

    /// Vendor error code to treat as success. May be repeated.
    #[arg(long = "ignore-error")]
    pub ignore_errors: Vec<i32>,

    #[arg(long, env = "RESTORED_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "RESTORED_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "RESTORED_USER")]
    pub user: Option<String>,

    /// `EnvFilter` directive, e.g. "info" or "restored=debug,sqlx=warn".
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Print the effective configuration (after all layers resolve) and exit.
    #[arg(long)]
    pub print_config: bool,
}

/// Early-exit hook for flags that don't run a restore. Returns `true` if the
/// process should exit now.
pub fn handle_cli(cli: &Cli, config: &crate::config::Config) -> bool {
    if cli.print_config {
        println!("{config:#?}");
        return true;
    }
    false
}
