//! Retry-with-reconnection for cross-connection visibility failures
//! (spec.md §7 policy, §9 "ordering guarantee").
//!
//! `ObjectMissing` on a data job is retried up to 10 times with exponential
//! backoff (500ms base, 5s cap); every third attempt forces a reconnect to
//! invalidate any cached metadata view the connection might be holding.
//! `TransientConnection` gets its own bounded reconnect loop. Anything else is
//! not retried at all.

use std::time::Duration;

use tracing::{info, warn};

use crate::db::DbConnection;
use crate::error::RestoreError;

const MAX_RETRIES: u32 = 10;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);
const RECONNECT_EVERY: u32 = 3;

fn backoff_for_attempt(attempt: u32) -> Duration {
    let millis = BASE_BACKOFF.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

/// Execute `statement` on `conn`, retrying on `ObjectMissing`/
/// `TransientConnection` per spec.md §7. `label` is for log correlation (e.g.
/// `"db.table"`). Returns rows affected on success, or
/// `RestoreError::RetryExhausted` once the budget runs out.
pub async fn execute_with_retry(
    conn: &mut dyn DbConnection,
    label: &str,
    statement: &str,
) -> Result<u64, RestoreError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match conn.execute(statement).await {
            Ok(rows) => return Ok(rows),
            Err(RestoreError::IgnorableByConfig { vendor_code, message }) => {
                info!(%label, vendor_code, %message, "ignoring error per ignore_errors config, counting as success");
                return Ok(0);
            }
            Err(err) if err.is_retryable() => {
                if attempt >= MAX_RETRIES {
                    warn!(%label, attempts = attempt, "retry budget exhausted: {err}");
                    return Err(RestoreError::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                if attempt % RECONNECT_EVERY == 0 {
                    info!(%label, attempt, "forcing connection reset before retry");
                    if let Err(reconnect_err) = conn.reconnect().await {
                        warn!(%label, "reconnect failed: {reconnect_err}");
                    }
                }
                let delay = backoff_for_attempt(attempt);
                info!(%label, attempt, ?delay, "retrying after {err}");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn backoff_caps_at_max() {
        assert_eq!(backoff_for_attempt(1), Duration::from_millis(500));
        assert_eq!(backoff_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(backoff_for_attempt(10), MAX_BACKOFF);
    }

    struct AlwaysIgnorable;

    #[async_trait]
    impl DbConnection for AlwaysIgnorable {
        async fn execute(&mut self, _statement: &str) -> Result<u64, RestoreError> {
            Err(RestoreError::IgnorableByConfig {
                vendor_code: 1051,
                message: "unknown table".into(),
            })
        }

        async fn reconnect(&mut self) -> Result<(), RestoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn ignorable_by_config_counts_as_success() {
        let mut conn = AlwaysIgnorable;
        let rows = execute_with_retry(&mut conn, "shop.orders", "DROP TABLE IF EXISTS orders")
            .await
            .expect("ignorable error must not propagate as Err");
        assert_eq!(rows, 0);
    }
}
