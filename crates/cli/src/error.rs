use core::fmt;
use predms_config::ConfigError;
use predms_db::DriverError;
use predms_executor::ExecutorError;
use predms_migration::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    UserError = 1,
    MigrationFailed = 2,
    ConnectionFailed = 3,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone)]
pub struct CliError {
    code: ExitCode,
    title: String,
    reason: Option<String>,
    meaning: Option<String>,
    action: Option<String>,
}

impl CliError {
    fn new(code: ExitCode, title: impl Into<String>) -> Self {
        Self {
            code,
            title: title.into(),
            reason: None,
            meaning: None,
            action: None,
        }
    }

    pub fn user_error(title: impl Into<String>) -> Self {
        Self::new(ExitCode::UserError, title)
    }

    pub fn migration_failed(title: impl Into<String>) -> Self {
        Self::new(ExitCode::MigrationFailed, title)
    }

    pub fn connection_failed(title: impl Into<String>) -> Self {
        Self::new(ExitCode::ConnectionFailed, title)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_meaning(mut self, meaning: impl Into<String>) -> Self {
        self.meaning = Some(meaning.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn meaning(&self) -> Option<&str> {
        self.meaning.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn code(&self) -> ExitCode {
        self.code
    }

    pub fn exit_code(&self) -> i32 {
        self.code.as_i32()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::user_error("Invalid configuration")
            .with_reason(err.to_string())
            .with_action("Check the .env file, the environment and the --config file.")
    }
}

pub fn connection_error(err: DriverError) -> CliError {
    CliError::connection_failed("Database connection failed")
        .with_reason(err.to_string())
        .with_action("Check MSSQL_TARGET_CONN_STR and that the target server is reachable.")
}

pub fn ledger_error(err: ExecutorError) -> CliError {
    CliError::migration_failed("Migration history is unavailable")
        .with_reason(err.to_string())
        .with_meaning("The MigrationHistory table could not be created, read or changed.")
}

pub fn import_error(err: ImportError) -> CliError {
    match err {
        ImportError::HealthCheck(e) => CliError::connection_failed("Database health check failed")
            .with_reason(e.to_string())
            .with_action("Check MSSQL_TARGET_CONN_STR and that the target server is reachable."),
        ImportError::Identifier(e) => CliError::user_error("Invalid SQL identifier").with_reason(e.to_string()),
        ImportError::Script(e) => CliError::user_error("SQL script unavailable")
            .with_reason(e.to_string())
            .with_action("Check SQL_SCRIPTS_DIR."),
        ImportError::Executor(ExecutorError::Execution(e)) => {
            let title = match e.name() {
                Some(name) => format!("Migration failed in {name}"),
                None => "Migration failed".to_string(),
            };
            CliError::migration_failed(title)
                .with_reason(e.driver_error().to_string())
                .with_meaning(format!("Statement: {}", e.sql_snippet()))
                .with_action("Fix the script and rerun; applied scripts are skipped.")
        }
        other => CliError::migration_failed("Migration failed").with_reason(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{import_error, CliError, ExitCode};
    use predms_config::ConfigError;
    use predms_migration::ImportError;

    #[test]
    fn builder_keeps_sections() {
        let err = CliError::migration_failed("boom")
            .with_reason("r")
            .with_meaning("m")
            .with_action("a");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "boom");
        assert_eq!((err.reason(), err.meaning(), err.action()), (Some("r"), Some("m"), Some("a")));
    }

    #[test]
    fn config_errors_are_user_errors() {
        let err = CliError::from(ConfigError::Missing {
            name: "MSSQL_TARGET_CONN_STR",
        });
        assert_eq!(err.code(), ExitCode::UserError);
        assert_eq!(err.reason(), Some("MSSQL_TARGET_CONN_STR is required"));
    }

    #[test]
    fn missing_primary_key_table_fails_the_migration() {
        let err = import_error(ImportError::MissingPrimaryKeyTable {
            table: "PrimaryKeyScripts".to_string(),
        });
        assert_eq!(err.code(), ExitCode::MigrationFailed);
    }
}
