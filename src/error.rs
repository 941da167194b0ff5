//! Portable error taxonomy for the restore pipeline
//!
//! Workers never propagate these through panics; they classify a failure, decide
//! whether to retry, and otherwise report it through counters and logs (see
//! `retry.rs` and `workers/data.rs`).

use thiserror::Error;

/// Portable classification of a failure observed while restoring a dump.
///
/// `ObjectMissing` is the special case the dispatcher retries with reconnection
/// (see `retry.rs`): it is how a cross-connection visibility failure presents,
/// indistinguishable at the wire level from a genuinely missing table.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// "table/database does not exist" as reported by the target server. May be a
    /// true missing object, or a visibility failure: the DDL committed on another
    /// connection hasn't become visible yet on this one.
    #[error("object missing (vendor code {vendor_code:?}): {message}")]
    ObjectMissing {
        vendor_code: Option<i32>,
        message: String,
    },

    /// Connection-level failure: broken pipe, reset, timeout, auth drop.
    #[error("transient connection failure: {message}")]
    TransientConnection { message: String },

    /// Syntax error, constraint violation, or anything else not worth retrying.
    #[error("fatal error: {message}")]
    Fatal { message: String },

    /// Vendor error code matched an entry in the user's `ignore_errors` set.
    #[error("ignorable error (vendor code {vendor_code}): {message}")]
    IgnorableByConfig { vendor_code: i32, message: String },

    /// Retry policy exhausted without success; caller should treat as `Fatal`.
    #[error("retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<RestoreError>,
    },
}

impl RestoreError {
    /// `true` for errors that should not halt the overall restore, only this job.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RestoreError::ObjectMissing { .. } | RestoreError::TransientConnection { .. }
        )
    }

    /// Vendor error code, if the underlying client surfaced one.
    pub fn vendor_code(&self) -> Option<i32> {
        match self {
            RestoreError::ObjectMissing { vendor_code, .. } => *vendor_code,
            RestoreError::IgnorableByConfig { vendor_code, .. } => Some(*vendor_code),
            _ => None,
        }
    }
}

/// Map a vendor-specific error code and message to a portable [`RestoreError`].
///
/// `ignore_errors` is checked first: an operator who explicitly asked to ignore a
/// code wants that outcome even for codes that would otherwise be `ObjectMissing`.
pub fn classify(
    vendor_code: Option<i32>,
    message: impl Into<String>,
    ignore_errors: &std::collections::HashSet<i32>,
) -> RestoreError {
    let message = message.into();

    if let Some(code) = vendor_code {
        if ignore_errors.contains(&code) {
            return RestoreError::IgnorableByConfig {
                vendor_code: code,
                message,
            };
        }
    }

    match vendor_code {
        // 1146: ER_NO_SUCH_TABLE on MySQL-dialect servers.
        // 1049: ER_BAD_DB_ERROR — database itself not visible yet.
        Some(1146) | Some(1049) => RestoreError::ObjectMissing {
            vendor_code,
            message,
        },
        Some(_) => RestoreError::Fatal { message },
        None => RestoreError::TransientConnection { message },
    }
}

/// Map a `sqlx` error through `classify`, consulting `ignore_errors`. This is
/// what `MySqlDbConnection::execute` calls, since it's the only place the
/// configured ignore set is actually in scope.
pub fn classify_sqlx_error(err: sqlx::Error, ignore_errors: &std::collections::HashSet<i32>) -> RestoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code().and_then(|c| c.parse::<i32>().ok());
        return classify(code, db_err.message().to_string(), ignore_errors);
    }
    RestoreError::TransientConnection {
        message: err.to_string(),
    }
}

/// Convenience conversion for connection-establishment failures, where there's
/// no statement result to weigh against `ignore_errors` yet.
impl From<sqlx::Error> for RestoreError {
    fn from(err: sqlx::Error) -> Self {
        classify_sqlx_error(err, &Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ignore_errors_wins_over_object_missing() {
        let mut ignore = HashSet::new();
        ignore.insert(1146);
        let err = classify(Some(1146), "table doesn't exist", &ignore);
        assert!(matches!(err, RestoreError::IgnorableByConfig { vendor_code: 1146, .. }));
    }

    #[test]
    fn unconfigured_vendor_code_still_classifies_normally() {
        let err = classify(Some(1146), "table doesn't exist", &HashSet::new());
        assert!(matches!(err, RestoreError::ObjectMissing { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn ignorable_by_config_is_not_retryable() {
        let err = RestoreError::IgnorableByConfig {
            vendor_code: 1051,
            message: "unknown table".into(),
        };
        assert!(!err.is_retryable());
    }
}
