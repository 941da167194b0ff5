//! Database client collaborator (spec.md §1 "external collaborators" — only the
//! interface is specified there; a concrete MySQL-dialect backend is included
//! here so the crate is runnable end-to-end, per `SPEC_FULL.md` §2 item 17).
//!
//! Every connection this crate opens is a dedicated, long-lived one owned by a
//! single worker for that worker's lifetime (spec.md §4.4 "Connection
//! discipline"), set to READ-COMMITTED at session start — not a style
//! preference, but the mechanism that makes the dispatcher's lock-protected
//! readiness check actually correspond to cross-connection visibility
//! (spec.md §9).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, Executor, MySqlConnection};

use crate::error::{classify_sqlx_error, RestoreError};

/// One DDL/DML statement executed against the target.
#[async_trait]
pub trait DbConnection: Send {
    /// Execute one statement, read verbatim from a dump file, returning the
    /// number of rows affected (0 for DDL).
    async fn execute(&mut self, statement: &str) -> Result<u64, RestoreError>;

    /// Force a fresh connection, invalidating any cached metadata/snapshot view
    /// (spec.md §7: "every third retry forces a connection reset").
    async fn reconnect(&mut self) -> Result<(), RestoreError>;
}

/// Connection parameters for the target server.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectOptions {
    fn to_sqlx(&self) -> MySqlConnectOptions {
        let mut opts = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user);
        if let Some(pw) = &self.password {
            opts = opts.password(pw);
        }
        if let Some(db) = &self.database {
            opts = opts.database(db);
        }
        opts
    }
}

/// `sqlx`-backed connection to a MySQL-dialect target.
pub struct MySqlDbConnection {
    options: ConnectOptions,
    conn: MySqlConnection,
    /// Vendor error codes the operator asked to treat as success (spec.md §6
    /// `ignore_errors`), consulted on every statement this connection runs.
    ignore_errors: Arc<HashSet<i32>>,
}

impl MySqlDbConnection {
    pub async fn connect(options: ConnectOptions, ignore_errors: Arc<HashSet<i32>>) -> Result<Self, RestoreError> {
        let mut conn = MySqlConnection::connect_with(&options.to_sqlx())
            .await
            .map_err(RestoreError::from)?;
        set_read_committed(&mut conn).await?;
        Ok(Self {
            options,
            conn,
            ignore_errors,
        })
    }
}

/// Session initialization: isolation must be READ-COMMITTED on every
/// connection (spec.md §6 "Outputs to the database client").
async fn set_read_committed(conn: &mut MySqlConnection) -> Result<(), RestoreError> {
    conn.execute("SET SESSION TRANSACTION ISOLATION LEVEL READ COMMITTED")
        .await
        .map_err(RestoreError::from)?;
    Ok(())
}

#[async_trait]
impl DbConnection for MySqlDbConnection {
    async fn execute(&mut self, statement: &str) -> Result<u64, RestoreError> {
        let result = self
            .conn
            .execute(statement)
            .await
            .map_err(|e| classify_sqlx_error(e, &self.ignore_errors))?;
        Ok(result.rows_affected())
    }

    async fn reconnect(&mut self) -> Result<(), RestoreError> {
        let mut conn = MySqlConnection::connect_with(&self.options.to_sqlx())
            .await
            .map_err(RestoreError::from)?;
        set_read_committed(&mut conn).await?;
        self.conn = conn;
        Ok(())
    }
}
