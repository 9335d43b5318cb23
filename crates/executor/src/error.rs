use core::fmt;
use predms_db::DriverError;
use predms_sql::sql_snippet;

/// A statement or batch that the driver rejected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("SQL execution failed for {}: {source}", .name.as_deref().unwrap_or("statement"))]
pub struct ExecutionError {
    sql: String,
    name: Option<String>,
    source: DriverError,
}

impl ExecutionError {
    pub fn new(sql: impl Into<String>, source: DriverError) -> Self {
        Self {
            sql: sql.into(),
            name: None,
            source,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn sql_snippet(&self) -> String {
        sql_snippet(&self.sql)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn driver_error(&self) -> &DriverError {
        &self.source
    }

    /// Lock timeouts and deadlock victims are worth another attempt.
    pub fn is_transient(&self) -> bool {
        let message = self.source.message().to_ascii_lowercase();
        message.contains("timeout") || message.contains("deadlock")
    }
}

#[derive(Debug, Clone)]
pub enum ExecutorError {
    Execution(ExecutionError),
    LedgerSetupFailed {
        message: String,
    },
    LedgerWriteFailed {
        script: String,
        message: String,
    },
    LedgerClearFailed {
        message: String,
    },
    TransactionCommitFailed {
        context: String,
        message: String,
    },
    TransactionRollbackFailed {
        context: String,
        message: String,
        original_error: String,
    },
}

impl ExecutorError {
    pub fn execution(&self) -> Option<&ExecutionError> {
        match self {
            ExecutorError::Execution(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Execution(err) => write!(f, "{err}"),
            ExecutorError::LedgerSetupFailed { message } => {
                write!(f, "migration ledger setup failed: {message}")
            }
            ExecutorError::LedgerWriteFailed { script, message } => write!(
                f,
                "script '{script}' ran but could not be recorded in the migration ledger: {message}"
            ),
            ExecutorError::LedgerClearFailed { message } => {
                write!(f, "migration ledger clear failed: {message}")
            }
            ExecutorError::TransactionCommitFailed { context, message } => {
                write!(f, "transaction commit failed ({context}): {message}")
            }
            ExecutorError::TransactionRollbackFailed {
                context,
                message,
                original_error,
            } => write!(
                f,
                "transaction rollback failed ({context}): {message}; original_error={original_error}"
            ),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Execution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExecutionError> for ExecutorError {
    fn from(err: ExecutionError) -> Self {
        ExecutorError::Execution(err)
    }
}
