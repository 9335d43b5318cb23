use predms_sql::IdentifierError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },
    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("failed to read config file '{path}': {message}")]
    File { path: String, message: String },
    #[error("invalid config file '{path}': {message}")]
    Parse { path: String, message: String },
    #[error("invalid target database name: {0}")]
    DatabaseName(#[from] IdentifierError),
}
