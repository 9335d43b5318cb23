pub mod error;
pub mod ledger;
pub mod metrics;
pub mod mode;
pub mod retry;
pub mod script;
pub mod statement;
pub mod transaction;

pub use error::{ExecutionError, ExecutorError};
pub use ledger::{MigrationLedger, MigrationRecord, LEDGER_TABLE};
pub use metrics::{Fanout, MetricsCounters, MetricsSink, NoopMetrics, OperationCounts};
pub use mode::{CommitPolicy, ExecutionMode};
pub use retry::{RetryPolicy, StepRunner};
pub use script::{ScriptOutcome, ScriptRunner};
pub use statement::TimedExecutor;
pub use transaction::TransactionScope;

/// Default per-statement timeout, in seconds.
pub const DEFAULT_SQL_TIMEOUT: u64 = 300;

/// Default number of attempts for a retried step.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;
