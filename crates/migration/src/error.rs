use predms_db::DriverError;
use predms_executor::{ExecutionError, ExecutorError};
use predms_sql::{IdentifierError, ScriptSourceError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("failed to write progress file '{path}': {message}")]
    Write { path: String, message: String },
    #[error("failed to remove progress file '{path}': {message}")]
    Remove { path: String, message: String },
}

#[derive(Debug, Error, Clone)]
pub enum ImportError {
    #[error("database health check failed: {0}")]
    HealthCheck(#[source] ExecutionError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Script(#[from] ScriptSourceError),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error("{table} table was not created by the primary key script")]
    MissingPrimaryKeyTable { table: String },
    #[error("join import failed: {message}")]
    JoinImport { message: String },
}

impl From<ExecutionError> for ImportError {
    fn from(err: ExecutionError) -> Self {
        ImportError::Executor(ExecutorError::from(err))
    }
}

impl ImportError {
    pub(crate) fn commit(context: impl Into<String>, source: DriverError) -> Self {
        ImportError::Executor(ExecutorError::TransactionCommitFailed {
            context: context.into(),
            message: source.to_string(),
        })
    }
}
