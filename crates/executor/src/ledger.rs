use crate::error::ExecutorError;
use predms_db::{Connection, Dialect, DriverError, Value};
use predms_sql::validate_identifier;
use tracing::{info, warn};

pub const LEDGER_TABLE: &str = "MigrationHistory";

const UNIQUE_CONSTRAINT: &str = "UQ_MigrationHistory_script_name";

fn qualified(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::SqlServer => "dbo.MigrationHistory",
        Dialect::Postgres | Dialect::Sqlite => "MigrationHistory",
    }
}

fn sql_table_exists(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::SqlServer => {
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WITH (NOLOCK) WHERE TABLE_SCHEMA = 'dbo' AND TABLE_NAME = 'MigrationHistory'"
        }
        Dialect::Postgres => {
            "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND lower(table_name) = 'migrationhistory'"
        }
        Dialect::Sqlite => {
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'MigrationHistory'"
        }
    }
}

fn sql_rowid_exists(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::SqlServer => {
            "SELECT 1 FROM INFORMATION_SCHEMA.COLUMNS WITH (NOLOCK) WHERE TABLE_SCHEMA = 'dbo' AND TABLE_NAME = 'MigrationHistory' AND COLUMN_NAME = 'ROWID'"
        }
        Dialect::Postgres => {
            "SELECT 1 FROM information_schema.columns WHERE table_schema = current_schema() AND lower(table_name) = 'migrationhistory' AND lower(column_name) = 'rowid'"
        }
        Dialect::Sqlite => {
            "SELECT 1 FROM pragma_table_info('MigrationHistory') WHERE upper(name) = 'ROWID'"
        }
    }
}

fn sql_create(dialect: Dialect, table: &str) -> String {
    match dialect {
        Dialect::SqlServer => format!(
            "CREATE TABLE {table}(
    ROWID INT IDENTITY(1,1) PRIMARY KEY,
    script_name NVARCHAR(255) NOT NULL,
    applied_at DATETIME DEFAULT GETDATE(),
    CONSTRAINT {UNIQUE_CONSTRAINT} UNIQUE (script_name)
)"
        ),
        Dialect::Postgres => format!(
            "CREATE TABLE {table} (
    ROWID SERIAL PRIMARY KEY,
    script_name VARCHAR(255) NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT {UNIQUE_CONSTRAINT} UNIQUE (script_name)
)"
        ),
        Dialect::Sqlite => format!(
            "CREATE TABLE {table} (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    script_name TEXT NOT NULL,
    applied_at TEXT DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT {UNIQUE_CONSTRAINT} UNIQUE (script_name)
)"
        ),
    }
}

fn sql_primary_key_name(dialect: Dialect) -> Option<&'static str> {
    match dialect {
        Dialect::SqlServer => Some(
            "SELECT CONSTRAINT_NAME FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS WITH (NOLOCK) WHERE TABLE_SCHEMA = 'dbo' AND TABLE_NAME = 'MigrationHistory' AND CONSTRAINT_TYPE = 'PRIMARY KEY'",
        ),
        Dialect::Postgres => Some(
            "SELECT constraint_name FROM information_schema.table_constraints WHERE table_schema = current_schema() AND lower(table_name) = 'migrationhistory' AND constraint_type = 'PRIMARY KEY'",
        ),
        Dialect::Sqlite => None,
    }
}

fn sql_unique_exists(dialect: Dialect) -> Option<&'static str> {
    match dialect {
        Dialect::SqlServer => Some(
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS WITH (NOLOCK) WHERE TABLE_SCHEMA = 'dbo' AND TABLE_NAME = 'MigrationHistory' AND CONSTRAINT_NAME = 'UQ_MigrationHistory_script_name'",
        ),
        Dialect::Postgres => Some(
            "SELECT 1 FROM information_schema.table_constraints WHERE table_schema = current_schema() AND lower(table_name) = 'migrationhistory' AND lower(constraint_name) = 'uq_migrationhistory_script_name'",
        ),
        Dialect::Sqlite => None,
    }
}

fn sql_select_applied(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::SqlServer => {
            "SELECT ROWID, script_name, CONVERT(VARCHAR(19), applied_at, 120) AS applied_at FROM dbo.MigrationHistory WITH (NOLOCK) ORDER BY ROWID"
        }
        Dialect::Postgres => {
            "SELECT ROWID, script_name, CAST(applied_at AS TEXT) AS applied_at FROM MigrationHistory ORDER BY ROWID"
        }
        Dialect::Sqlite => {
            "SELECT ROWID, script_name, applied_at FROM MigrationHistory ORDER BY ROWID"
        }
    }
}

/// One applied script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub row_id: i64,
    pub script_name: String,
    pub applied_at: Option<String>,
}

/// Persistent record of which named scripts have been applied.
///
/// A name present in the ledger is treated as permanently applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct MigrationLedger;

impl MigrationLedger {
    pub fn new() -> Self {
        Self
    }

    /// Create the ledger table if missing, upgrading a legacy table that lacks
    /// `ROWID` and the unique constraint on `script_name`.
    pub async fn ensure_table(&self, conn: &mut Connection) -> Result<(), ExecutorError> {
        match ensure_table_inner(conn).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(rb) = conn.rollback().await {
                    warn!(error = %rb, "rollback after ledger setup failure also failed");
                }
                Err(ExecutorError::LedgerSetupFailed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Whether `name` has been applied. Unreadable ledgers count as "not applied".
    pub async fn has(&self, conn: &mut Connection, name: &str) -> bool {
        let dialect = conn.dialect();
        let sql = format!(
            "SELECT 1 FROM {}{} WHERE script_name = {}",
            qualified(dialect),
            dialect.nolock(),
            dialect.placeholder(1)
        );

        match conn.query(&sql, &[Value::from(name)]).await {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                warn!(script = name, error = %e, "migration ledger lookup failed; treating as not applied");
                false
            }
        }
    }

    /// Ensure the table, insert `name` and commit immediately.
    pub async fn record(&self, conn: &mut Connection, name: &str) -> Result<(), ExecutorError> {
        self.ensure_table(conn).await?;

        let result = match self.insert(conn, name).await {
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

    /// Insert without committing, so the entry joins the caller's transaction.
    pub(crate) async fn insert(&self, conn: &mut Connection, name: &str) -> Result<(), DriverError> {
        let dialect = conn.dialect();
        let sql = format!(
            "INSERT INTO {} (script_name) VALUES ({})",
            qualified(dialect),
            dialect.placeholder(1)
        );
        conn.query(&sql, &[Value::from(name)]).await?;
        Ok(())
    }

    pub async fn applied(&self, conn: &mut Connection) -> Result<Vec<MigrationRecord>, ExecutorError> {
        self.ensure_table(conn).await?;

        let rows = conn
            .query(sql_select_applied(conn.dialect()), &[])
            .await
            .map_err(|e| ExecutorError::LedgerSetupFailed {
                message: e.to_string(),
            })?;

        Ok(rows
            .iter()
            .map(|row| MigrationRecord {
                row_id: row.int("ROWID").unwrap_or_default(),
                script_name: row.text("script_name").unwrap_or_default(),
                applied_at: row.text("applied_at"),
            })
            .collect())
    }

    /// Forget every applied script so the next run starts fresh.
    pub async fn clear(&self, conn: &mut Connection) -> Result<(), ExecutorError> {
        self.ensure_table(conn).await?;

        let sql = format!("DELETE FROM {}", qualified(conn.dialect()));
        let result = match conn.query(&sql, &[]).await {
            Ok(_) => conn.commit().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("migration ledger cleared");
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = conn.rollback().await {
                    warn!(error = %rb, "rollback after ledger clear failure also failed");
                }
                Err(ExecutorError::LedgerClearFailed {
                    message: e.to_string(),
                })
            }
        }
    }
}

async fn ensure_table_inner(conn: &mut Connection) -> Result<(), DriverError> {
    let dialect = conn.dialect();

    let exists = !conn.query(sql_table_exists(dialect), &[]).await?.is_empty();
    if !exists {
        conn.query(&sql_create(dialect, qualified(dialect)), &[]).await?;
        conn.commit().await?;
        info!(table = LEDGER_TABLE, "created migration ledger");
        return Ok(());
    }

    let has_rowid = !conn.query(sql_rowid_exists(dialect), &[]).await?.is_empty();
    if has_rowid {
        return Ok(());
    }

    info!(table = LEDGER_TABLE, "upgrading legacy migration ledger");
    match dialect {
        Dialect::SqlServer | Dialect::Postgres => upgrade_in_place(conn, dialect).await?,
        Dialect::Sqlite => rebuild(conn).await?,
    }
    conn.commit().await?;
    Ok(())
}

async fn upgrade_in_place(conn: &mut Connection, dialect: Dialect) -> Result<(), DriverError> {
    let table = qualified(dialect);

    if let Some(sql) = sql_primary_key_name(dialect) {
        let rows = conn.query(sql, &[]).await?;
        if let Some(pk) = rows.first().and_then(|r| r.at(0).and_then(Value::to_text)) {
            let pk = validate_identifier(&pk).map_err(|e| DriverError::new(e.to_string()))?;
            conn.query(&format!("ALTER TABLE {table} DROP CONSTRAINT {pk}"), &[])
                .await?;
        }
    }

    let add_rowid = match dialect {
        Dialect::SqlServer => format!("ALTER TABLE {table} ADD ROWID INT IDENTITY(1,1) PRIMARY KEY"),
        _ => format!("ALTER TABLE {table} ADD COLUMN ROWID SERIAL PRIMARY KEY"),
    };
    conn.query(&add_rowid, &[]).await?;

    let unique_exists = match sql_unique_exists(dialect) {
        Some(sql) => !conn.query(sql, &[]).await?.is_empty(),
        None => false,
    };
    if !unique_exists {
        conn.query(
            &format!("ALTER TABLE {table} ADD CONSTRAINT {UNIQUE_CONSTRAINT} UNIQUE (script_name)"),
            &[],
        )
        .await?;
    }

    Ok(())
}

// SQLite cannot add a primary key to an existing table, so copy into a fresh one.
async fn rebuild(conn: &mut Connection) -> Result<(), DriverError> {
    let staging = "MigrationHistory_upgrade";
    conn.query(&format!("DROP TABLE IF EXISTS {staging}"), &[]).await?;
    conn.query(&sql_create(Dialect::Sqlite, staging), &[]).await?;
    conn.query(
        &format!(
            "INSERT INTO {staging} (script_name, applied_at) SELECT script_name, MIN(applied_at) FROM MigrationHistory GROUP BY script_name ORDER BY MIN(applied_at)"
        ),
        &[],
    )
    .await?;
    conn.query("DROP TABLE MigrationHistory", &[]).await?;
    conn.query(&format!("ALTER TABLE {staging} RENAME TO MigrationHistory"), &[])
        .await?;
    Ok(())
}
