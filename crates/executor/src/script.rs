use crate::error::{ExecutionError, ExecutorError};
use crate::ledger::MigrationLedger;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::mode::{CommitPolicy, ExecutionMode};
use crate::statement::TimedExecutor;
use predms_db::Connection;
use predms_sql::{split_script, SqlBatch};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// The script ran; `batches` units were executed.
    Applied { batches: usize },
    /// The ledger already had the script; nothing ran.
    Skipped,
}

/// Executes named scripts at most once, gated by the migration ledger.
#[derive(Clone)]
pub struct ScriptRunner {
    executor: TimedExecutor,
    ledger: MigrationLedger,
    mode: ExecutionMode,
    commit_policy: CommitPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl ScriptRunner {
    pub fn new(executor: TimedExecutor) -> Self {
        Self {
            executor,
            ledger: MigrationLedger::new(),
            mode: ExecutionMode::default(),
            commit_policy: CommitPolicy::default(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn ledger(&self) -> MigrationLedger {
        self.ledger
    }

    /// Run `sql` under `name` unless the ledger says it already ran.
    ///
    /// With [`CommitPolicy::PerBatch`] a failing unit leaves the earlier units
    /// committed, and a rerun starts again from the first unit.
    pub async fn run(
        &self,
        conn: &mut Connection,
        name: &str,
        sql: &str,
    ) -> Result<ScriptOutcome, ExecutorError> {
        self.ledger.ensure_table(conn).await?;
        if self.ledger.has(conn, name).await {
            info!(script = name, "already applied, skipping");
            return Ok(ScriptOutcome::Skipped);
        }

        let units = match self.mode {
            ExecutionMode::Raw => vec![SqlBatch::new(1, sql)],
            ExecutionMode::Batched(strategy) => split_script(sql, strategy),
        };

        info!(
            script = name,
            mode = self.mode.as_str(),
            commit = self.commit_policy.as_str(),
            units = units.len(),
            "running script"
        );

        match self.apply(conn, name, &units).await {
            Ok(()) => {
                self.metrics.record_success(name);
                info!(script = name, units = units.len(), "script applied");
                Ok(ScriptOutcome::Applied {
                    batches: units.len(),
                })
            }
            Err(err) => {
                self.metrics.record_failure(name);
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        conn: &mut Connection,
        name: &str,
        units: &[SqlBatch],
    ) -> Result<(), ExecutorError> {
        for unit in units {
            if let Err(err) = self.executor.execute(conn, unit.sql(), &[], Some(name)).await {
                self.rollback_after(conn, name, &err).await;
                warn!(
                    script = name,
                    unit = unit.ordinal,
                    total = units.len(),
                    sql = %err.sql_snippet(),
                    "script unit failed"
                );
                return Err(err.into());
            }

            if self.commit_policy == CommitPolicy::PerBatch {
                conn.commit()
                    .await
                    .map_err(|e| ExecutorError::TransactionCommitFailed {
                        context: format!("{name} unit {}", unit.ordinal),
                        message: e.to_string(),
                    })?;
            }
        }

        match self.commit_policy {
            CommitPolicy::PerBatch => self.ledger.record(conn, name).await,
            CommitPolicy::PerScript => {
                let result = match self.ledger.insert(conn, name).await {
                    Ok(()) => conn.commit().await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        if let Err(rb) = conn.rollback().await {
                            warn!(script = name, error = %rb, "rollback after ledger write failure also failed");
                        }
                        Err(ExecutorError::LedgerWriteFailed {
                            script: name.to_string(),
                            message: e.to_string(),
                        })
                    }
                }
            }
        }
    }

    async fn rollback_after(&self, conn: &mut Connection, name: &str, err: &ExecutionError) {
        if let Err(rb) = conn.rollback().await {
            let rollback_error = ExecutorError::TransactionRollbackFailed {
                context: name.to_string(),
                message: rb.to_string(),
                original_error: err.to_string(),
            };
            warn!(error = %rollback_error, "rollback after script failure failed");
        }
    }
}
