use crate::error::ConfigError;
use predms_db::{MssqlUrl, Shape};
use predms_executor::{CommitPolicy, DEFAULT_SQL_TIMEOUT, MAX_RETRY_ATTEMPTS};
use predms_sql::validate_identifier;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Keys accepted in the JSON config file. All are optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub include_empty_tables: Option<bool>,
    pub always_include_tables: Vec<String>,
    pub skip_pk_creation: Option<bool>,
    pub sql_timeout: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub commit_policy: Option<String>,
    pub batch_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub conn_str: Option<String>,
    pub db_name: Option<String>,
    pub resume: bool,
    pub shape: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub conn_str: String,
    pub db_name: String,
    pub log_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub sql_timeout: u64,
    pub max_retry_attempts: u32,
    pub include_empty_tables: bool,
    pub always_include_tables: Vec<String>,
    pub skip_pk_creation: bool,
    pub resume: bool,
    pub progress_file: Option<PathBuf>,
    pub prometheus_port: Option<u16>,
    pub shape: Shape,
    pub commit_policy: CommitPolicy,
    pub log_file: Option<PathBuf>,
    /// Rows recorded per commit while cataloguing LOB columns.
    pub batch_size: usize,
}

impl Settings {
    /// Defaults, then the JSON file, then the process environment, then `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars, overrides)
    }

    pub fn from_vars(vars: &HashMap<String, String>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config_path = overrides
            .config_file
            .clone()
            .or_else(|| var("ETL_CONFIG_FILE").map(PathBuf::from));
        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let conn_str = overrides
            .conn_str
            .clone()
            .or_else(|| var("MSSQL_TARGET_CONN_STR"))
            .ok_or(ConfigError::Missing {
                name: "MSSQL_TARGET_CONN_STR",
            })?;

        let db_name = overrides
            .db_name
            .clone()
            .or_else(|| var("MSSQL_TARGET_DB_NAME"))
            .or_else(|| parse_database_name(&conn_str))
            .ok_or(ConfigError::Missing {
                name: "MSSQL_TARGET_DB_NAME",
            })?;
        validate_identifier(&db_name)?;

        let sql_timeout = match var("SQL_TIMEOUT") {
            Some(v) => parse_positive("SQL_TIMEOUT", &v)?,
            None => file.sql_timeout.unwrap_or(DEFAULT_SQL_TIMEOUT),
        };
        if sql_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: "sql_timeout",
                value: sql_timeout.to_string(),
                reason: "must be positive",
            });
        }

        let max_retry_attempts = match var("MAX_RETRY_ATTEMPTS") {
            Some(v) => {
                let n = parse_positive("MAX_RETRY_ATTEMPTS", &v)?;
                u32::try_from(n).map_err(|_| ConfigError::Invalid {
                    name: "MAX_RETRY_ATTEMPTS",
                    value: v,
                    reason: "too large",
                })?
            }
            None => MAX_RETRY_ATTEMPTS,
        };

        let include_empty_tables = match var("INCLUDE_EMPTY_TABLES") {
            Some(v) => parse_flag("INCLUDE_EMPTY_TABLES", &v)?,
            None => file.include_empty_tables.unwrap_or(false),
        };

        let resume = overrides.resume
            || match var("RESUME") {
                Some(v) => parse_flag("RESUME", &v)?,
                None => false,
            };

        let prometheus_port = match var("PROMETHEUS_PORT") {
            Some(v) => Some(v.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PROMETHEUS_PORT",
                value: v.clone(),
                reason: "expected a port number",
            })?),
            None => None,
        };

        let shape = match overrides.shape.clone().or_else(|| var("CONNECTION_SHAPE")) {
            Some(v) => Shape::parse(&v).ok_or(ConfigError::Invalid {
                name: "CONNECTION_SHAPE",
                value: v,
                reason: "expected 'statement' or 'cursor'",
            })?,
            None => Shape::Cursor,
        };

        let batch_size = match var("BATCH_SIZE") {
            Some(v) => {
                let n = parse_positive("BATCH_SIZE", &v)?;
                usize::try_from(n).map_err(|_| ConfigError::Invalid {
                    name: "BATCH_SIZE",
                    value: v,
                    reason: "too large",
                })?
            }
            None => file.batch_size.filter(|n| *n > 0).unwrap_or(DEFAULT_BATCH_SIZE),
        };

        let commit_policy = match file.commit_policy {
            Some(v) => CommitPolicy::parse(&v).ok_or(ConfigError::Invalid {
                name: "commit_policy",
                value: v,
                reason: "expected 'script' or 'batch'",
            })?,
            None => CommitPolicy::default(),
        };

        Ok(Self {
            conn_str,
            db_name,
            log_dir: var("EJ_LOG_DIR").map_or_else(|| PathBuf::from("logs"), PathBuf::from),
            scripts_dir: var("SQL_SCRIPTS_DIR")
                .map_or_else(|| PathBuf::from("sql_scripts"), PathBuf::from),
            sql_timeout,
            max_retry_attempts,
            include_empty_tables,
            always_include_tables: file.always_include_tables,
            skip_pk_creation: file.skip_pk_creation.unwrap_or(false),
            resume,
            progress_file: var("PROGRESS_FILE").map(PathBuf::from),
            prometheus_port,
            shape,
            commit_policy,
            log_file: file.log_file,
            batch_size,
        })
    }

    /// `PROGRESS_FILE` when set, otherwise `<log_dir>/<kind>_progress.json`.
    pub fn progress_file_for(&self, kind: &str) -> PathBuf {
        self.progress_file
            .clone()
            .unwrap_or_else(|| self.log_dir.join(format!("{kind}_progress.json")))
    }
}

/// The `Database=` or `Initial Catalog=` component of an ADO/ODBC connection string,
/// or the path of a `mssql://host/database` URL.
pub fn parse_database_name(conn_str: &str) -> Option<String> {
    let lower = conn_str.trim().to_ascii_lowercase();
    if (lower.starts_with("mssql://") || lower.starts_with("sqlserver://")) && !lower.contains(';') {
        return MssqlUrl::parse(conn_str).ok().and_then(|url| url.database);
    }
    conn_str.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        ((key == "database" || key == "initial catalog") && !value.is_empty())
            .then(|| value.to_string())
    })
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be a positive integer",
        }),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected 1/0 or true/false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_database_name, ConfigError, Overrides, Settings};
    use predms_db::Shape;
    use predms_executor::CommitPolicy;
    use std::collections::HashMap;
    use std::path::PathBuf;

    const CONN: &str = "Driver={ODBC Driver 17 for SQL Server};Server=db;Database=TargetDB;UID=etl;PWD=x";

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_fill_everything_but_the_connection() {
        let s = Settings::from_vars(&vars(&[("MSSQL_TARGET_CONN_STR", CONN)]), &Overrides::default())
            .unwrap();

        assert_eq!(s.db_name, "TargetDB");
        assert_eq!(s.sql_timeout, 300);
        assert_eq!(s.max_retry_attempts, 3);
        assert_eq!(s.log_dir, PathBuf::from("logs"));
        assert_eq!(s.scripts_dir, PathBuf::from("sql_scripts"));
        assert_eq!(s.shape, Shape::Cursor);
        assert_eq!(s.commit_policy, CommitPolicy::PerScript);
        assert!(!s.resume && !s.include_empty_tables && !s.skip_pk_creation);
        assert_eq!(
            s.progress_file_for("justice"),
            PathBuf::from("logs").join("justice_progress.json")
        );
    }

    #[test]
    fn connection_string_is_required() {
        let err = Settings::from_vars(&vars(&[]), &Overrides::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                name: "MSSQL_TARGET_CONN_STR"
            }
        );
    }

    #[test]
    fn database_name_must_be_an_identifier() {
        let err = Settings::from_vars(
            &vars(&[("MSSQL_TARGET_CONN_STR", CONN), ("MSSQL_TARGET_DB_NAME", "bad;name")]),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DatabaseName(_)));
    }

    #[test]
    fn environment_values_are_validated() {
        for (name, value) in [
            ("SQL_TIMEOUT", "0"),
            ("MAX_RETRY_ATTEMPTS", "-1"),
            ("INCLUDE_EMPTY_TABLES", "maybe"),
            ("PROMETHEUS_PORT", "99999"),
            ("CONNECTION_SHAPE", "pool"),
        ] {
            let result = Settings::from_vars(
                &vars(&[("MSSQL_TARGET_CONN_STR", CONN), (name, value)]),
                &Overrides::default(),
            );
            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "{name}={value}"
            );
        }
    }

    #[test]
    fn file_then_env_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.json");
        std::fs::write(
            &path,
            r#"{
                "include_empty_tables": true,
                "always_include_tables": ["dbo.Codes"],
                "skip_pk_creation": true,
                "sql_timeout": 60,
                "log_file": "run.log",
                "commit_policy": "batch"
            }"#,
        )
        .unwrap();

        let env = vars(&[
            ("MSSQL_TARGET_CONN_STR", CONN),
            ("ETL_CONFIG_FILE", path.to_str().unwrap()),
            ("SQL_TIMEOUT", "90"),
            ("CONNECTION_SHAPE", "cursor"),
            ("PROGRESS_FILE", "state.json"),
        ]);
        let overrides = Overrides {
            db_name: Some("OtherDB".to_string()),
            resume: true,
            shape: Some("statement".to_string()),
            ..Overrides::default()
        };

        let s = Settings::from_vars(&env, &overrides).unwrap();
        assert_eq!(s.db_name, "OtherDB");
        assert_eq!(s.sql_timeout, 90);
        assert!(s.include_empty_tables);
        assert!(s.skip_pk_creation);
        assert!(s.resume);
        assert_eq!(s.always_include_tables, vec!["dbo.Codes"]);
        assert_eq!(s.log_file, Some(PathBuf::from("run.log")));
        assert_eq!(s.commit_policy, CommitPolicy::PerBatch);
        assert_eq!(s.shape, Shape::Statement);
        assert_eq!(s.progress_file_for("justice"), PathBuf::from("state.json"));
    }

    #[test]
    fn unreadable_config_file_is_reported() {
        let overrides = Overrides {
            config_file: Some(PathBuf::from("/nonexistent/etl.json")),
            ..Overrides::default()
        };
        let err = Settings::from_vars(&vars(&[("MSSQL_TARGET_CONN_STR", CONN)]), &overrides)
            .unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }

    #[test]
    fn database_name_from_connection_string() {
        assert_eq!(parse_database_name(CONN).as_deref(), Some("TargetDB"));
        assert_eq!(
            parse_database_name("Server=x; Initial Catalog = Ops ;").as_deref(),
            Some("Ops")
        );
        assert_eq!(parse_database_name("Server=x"), None);
    }

    #[test]
    fn database_name_from_sql_server_urls() {
        assert_eq!(
            parse_database_name("mssql://sa:pw@db:1433/JusticeDB").as_deref(),
            Some("JusticeDB")
        );
        assert_eq!(
            parse_database_name("sqlserver://db:1433;database=OpsDB").as_deref(),
            Some("OpsDB")
        );
    }

    #[test]
    fn batch_size_comes_from_the_environment_first() {
        let conn = ("MSSQL_TARGET_CONN_STR", CONN);
        let s = Settings::from_vars(&vars(&[conn]), &Overrides::default()).unwrap();
        assert_eq!(s.batch_size, 100);

        let s = Settings::from_vars(&vars(&[conn, ("BATCH_SIZE", "250")]), &Overrides::default())
            .unwrap();
        assert_eq!(s.batch_size, 250);

        let err = Settings::from_vars(&vars(&[conn, ("BATCH_SIZE", "0")]), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BATCH_SIZE", .. }));
    }
}
