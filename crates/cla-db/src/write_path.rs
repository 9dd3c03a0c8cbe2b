//! Transactional write path for ledger mutations.
//!
//! Every ledger write follows the same sequence: load the binding,
//! validate the mutation against that snapshot, then issue one `UPDATE`
//! whose `WHERE` clause re-checks only what the mutation depends on (the
//! signer key is absent for an append, the addressed array slot still
//! holds the same signer for an element update). Writes for unrelated
//! signers of the same binding therefore never invalidate each other.
//!
//! An update that matches no row lost a race on the same signer, so the
//! session reloads and validates again; the next validation reports the
//! duplicate or the missing record. Storage-level transaction conflicts
//! are retried with exponential backoff and jitter.
//!
//! Each store round-trip is bounded by [`StoreConfig::operation_timeout`].

use std::future::Future;
use std::time::Duration;

use cla_core::error::{ClaError, ClaResult, StorageError};
use rand::Rng;
use tracing::{debug, warn};

use crate::connection::StoreConfig;
use crate::error::DbError;

/// Run `fut` under the configured deadline.
pub(crate) async fn with_deadline<T>(
    config: &StoreConfig,
    operation: &'static str,
    fut: impl Future<Output = Result<T, DbError>>,
) -> Result<T, DbError> {
    match tokio::time::timeout(config.operation_timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, "Store operation timed out");
            Err(DbError::Timeout {
                operation: operation.into(),
            })
        }
    }
}

/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`
/// capped at `max`, with the upper half drawn at random.
fn backoff(config: &StoreConfig, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(16);
    let capped = config
        .retry_backoff
        .saturating_mul(1u32 << exponent)
        .min(config.max_retry_backoff);
    let half = capped / 2;
    half + half.mul_f64(rand::rng().random::<f64>())
}

/// Attempt bookkeeping for one guarded ledger write.
pub(crate) struct WriteSession<'a> {
    config: &'a StoreConfig,
    operation: &'static str,
    attempt: u32,
}

impl<'a> WriteSession<'a> {
    pub(crate) fn new(config: &'a StoreConfig, operation: &'static str) -> Self {
        Self {
            config,
            operation,
            attempt: 0,
        }
    }

    /// Start the next attempt, backing off after a lost race. Returns
    /// `false` once the attempt budget is spent.
    pub(crate) async fn next_attempt(&mut self) -> bool {
        if self.attempt >= self.config.max_write_attempts.max(1) {
            return false;
        }
        if self.attempt > 0 {
            debug!(
                operation = self.operation,
                attempt = self.attempt + 1,
                "Retrying ledger write"
            );
            let delay = backoff(self.config, self.attempt);
            tokio::time::sleep(delay).await;
        }
        self.attempt += 1;
        true
    }

    /// Run one store round-trip of this session under the deadline.
    pub(crate) async fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, DbError> {
        with_deadline(self.config, self.operation, fut).await
    }

    /// Classify the result of a conditional update.
    ///
    /// `Ok(Some(_))` means the write landed, `Ok(None)` means the guard no
    /// longer held or the store reported a conflict, and the caller should
    /// reload and retry.
    pub(crate) fn settle<T>(&self, outcome: Result<Option<T>, DbError>) -> ClaResult<Option<T>> {
        match outcome {
            Ok(applied) => Ok(applied),
            Err(e) if e.is_conflict() => {
                debug!(operation = self.operation, error = %e, "Write conflict");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Error reported when every attempt lost its race.
    pub(crate) fn exhausted(&self) -> ClaError {
        warn!(
            operation = self.operation,
            attempts = self.attempt,
            "Ledger write gave up after repeated conflicts"
        );
        StorageError::Conflict {
            attempts: self.attempt,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(attempts: u32) -> StoreConfig {
        StoreConfig {
            operation_timeout: Duration::from_millis(50),
            max_write_attempts: attempts,
            retry_backoff: Duration::ZERO,
            max_retry_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap_with_jitter() {
        let config = StoreConfig {
            retry_backoff: Duration::from_millis(10),
            max_retry_backoff: Duration::from_millis(100),
            ..StoreConfig::default()
        };
        for _ in 0..50 {
            let first = backoff(&config, 1);
            assert!(first >= Duration::from_millis(5) && first <= Duration::from_millis(10));

            let third = backoff(&config, 3);
            assert!(third >= Duration::from_millis(20) && third <= Duration::from_millis(40));

            let late = backoff(&config, 30);
            assert!(late >= Duration::from_millis(50) && late <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn session_stops_after_budget() {
        let config = config(3);
        let mut session = WriteSession::new(&config, "test");
        let mut attempts = 0;
        while session.next_attempt().await {
            attempts += 1;
        }
        assert_eq!(attempts, 3);
        assert!(matches!(
            session.exhausted(),
            ClaError::Storage(StorageError::Conflict { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn zero_budget_still_attempts_once() {
        let config = config(0);
        let mut session = WriteSession::new(&config, "test");
        assert!(session.next_attempt().await);
        assert!(!session.next_attempt().await);
    }

    #[tokio::test]
    async fn slow_operations_time_out() {
        let config = config(1);
        let result: Result<(), DbError> = with_deadline(&config, "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(DbError::Timeout { .. })));
    }

    #[test]
    fn conflicts_settle_as_retry() {
        let config = config(1);
        let session = WriteSession::new(&config, "test");
        let conflict: Result<Option<u64>, DbError> =
            Err(DbError::Query("read or write conflict".into()));
        assert_eq!(session.settle(conflict).unwrap(), None);
        assert_eq!(session.settle(Ok(Some(3u64))).unwrap(), Some(3));
        assert_eq!(session.settle(Ok(None::<u64>)).unwrap(), None);
        let failure: Result<Option<u64>, DbError> = Err(DbError::Query("parse error".into()));
        assert!(session.settle(failure).is_err());
    }
}
