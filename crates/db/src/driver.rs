use crate::adapter::{CursorAdapter, StatementAdapter};
use crate::any::SqlxDriver;
use crate::connection::{Connection, Shape};
use crate::dialect::Dialect;
use crate::error::DriverError;
use crate::mssql::MssqlDriver;
use crate::value::{RowSet, Value};
use async_trait::async_trait;
use url::Url;

/// Lowest-level access to a store: run one piece of SQL text and collect its rows.
///
/// A driver knows nothing about transactions; `BEGIN`/`COMMIT` are issued as plain
/// SQL by the connection adapters.
#[async_trait]
pub trait Driver: Send {
    fn dialect(&self) -> Dialect;

    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError>;
}

/// Open a driver for `url`, picking the backend from its scheme.
///
/// SQL Server accepts ADO.NET (`Server=...;Database=...`), JDBC
/// (`jdbc:sqlserver://...`) and URL (`mssql://` or `sqlserver://`) forms;
/// Postgres and SQLite URLs go through sqlx.
pub async fn open(url: &str) -> Result<Box<dyn Driver>, DriverError> {
    match Dialect::detect(url) {
        Some(Dialect::SqlServer) => Ok(Box::new(MssqlDriver::connect(url).await?)),
        Some(dialect) => Ok(Box::new(SqlxDriver::connect(url, dialect).await?)),
        None => Err(DriverError::new(format!(
            "unsupported connection string (expected SQL Server, postgres:// or sqlite:): {}",
            redact(url)
        ))),
    }
}

/// Open `url` and wrap it in the requested shape.
///
/// `autocommit` only applies to the cursor shape; `None` gives a cursor
/// connection without an autocommit flag.
pub async fn connect(
    url: &str,
    shape: Shape,
    autocommit: Option<bool>,
) -> Result<Connection, DriverError> {
    let driver = open(url).await?;
    Ok(match shape {
        Shape::Statement => Connection::statement(StatementAdapter::new(driver)),
        Shape::Cursor => Connection::cursor(CursorAdapter::with_autocommit(driver, autocommit)),
    })
}

fn redact(conn_str: &str) -> String {
    let masked = match Url::parse(conn_str.trim()) {
        Ok(mut url) if url.password().is_some() => match url.set_password(Some("***")) {
            Ok(()) => url.to_string(),
            Err(()) => conn_str.to_string(),
        },
        _ => conn_str.to_string(),
    };

    masked
        .split(';')
        .map(|part| {
            let key = part.split('=').next().unwrap_or("").trim().to_ascii_lowercase();
            if matches!(key.as_str(), "password" | "pwd") {
                format!("{key}=***")
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}
