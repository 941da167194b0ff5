//! Target-server connection options (spec.md §6 "Outputs to the database client").

use serde::Deserialize;

use crate::db::ConnectOptions;

#[derive(Debug, Deserialize, Default)]
pub struct FileConnection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
}

pub fn from_file(file: Option<FileConnection>) -> ConnectOptions {
    let file = file.unwrap_or_default();
    ConnectOptions {
        host: std::env::var("RESTORED_HOST")
            .ok()
            .or(file.host)
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: std::env::var("RESTORED_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.port)
            .unwrap_or(3306),
        user: std::env::var("RESTORED_USER")
            .ok()
            .or(file.user)
            .unwrap_or_else(|| "root".to_string()),
        password: std::env::var("RESTORED_PASSWORD").ok(),
        database: file.database,
    }
}
