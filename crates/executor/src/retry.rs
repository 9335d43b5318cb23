use crate::error::ExecutionError;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::statement::TimedExecutor;
use core::time::Duration;
use predms_db::{Connection, RowSet, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Bounded exponential backoff: attempt `n` (from 0) waits `base_delay * 2^n`
/// before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::MAX_RETRY_ATTEMPTS,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs named steps, optionally retrying transient failures.
///
/// A step is a single logical SQL operation. Every attempt is reported to the
/// metrics sink; the runner never touches the migration ledger.
#[derive(Clone)]
pub struct StepRunner {
    executor: TimedExecutor,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl StepRunner {
    pub fn new(executor: TimedExecutor, policy: RetryPolicy) -> Self {
        Self {
            executor,
            policy,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// One attempt, counted as one success or one failure.
    pub async fn run_step(
        &self,
        conn: &mut Connection,
        name: &str,
        sql: &str,
        params: &[Value],
    ) -> Result<RowSet, ExecutionError> {
        match self.executor.execute(conn, sql, params, Some(name)).await {
            Ok(rows) => {
                self.metrics.record_success(name);
                Ok(rows)
            }
            Err(err) => {
                self.metrics.record_failure(name);
                Err(err)
            }
        }
    }

    /// Retry transient failures until the policy's attempts are used up.
    ///
    /// Non-transient errors return after the first attempt. Before each retry the
    /// connection is rolled back so the next attempt opens a fresh transaction;
    /// uncommitted work from earlier statements in the same transaction is lost.
    pub async fn run_with_retry(
        &self,
        conn: &mut Connection,
        name: &str,
        sql: &str,
        params: &[Value],
    ) -> Result<RowSet, ExecutionError> {
        let attempts = self.policy.attempts();
        let mut attempt = 0u32;

        loop {
            match self.run_step(conn, name, sql, params).await {
                Ok(rows) => {
                    if attempt > 0 {
                        info!(step = name, attempt = attempt + 1, "step succeeded after retry");
                    }
                    return Ok(rows);
                }
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        step = name,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    if let Err(rollback_err) = conn.rollback().await {
                        warn!(step = name, error = %rollback_err, "rollback before retry failed");
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;
    use core::time::Duration;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0).attempts(), 1);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(10));
        assert!(policy.delay_for(40) >= policy.delay_for(31));
    }
}
