//! Right-sizing of large text columns once all three imports are done.
//!
//! The run has three phases: the `lob/gather_lobs.sql` script creates the
//! `LOB_COLUMN_UPDATES` tracking table, every large text column is measured and
//! recorded there with its `ALTER COLUMN` statement, and the recorded statements
//! are applied widest column first with a commit per statement.

use crate::error::ImportError;
use crate::error_log::ErrorLog;
use crate::filter::TableFilter;
use crate::profile::{script_name, DatabaseKind};
use crate::queries;
use predms_db::{Connection, Dialect, RowRef, Value};
use predms_executor::{ScriptOutcome, ScriptRunner, TimedExecutor, TransactionScope, LEDGER_TABLE};
use predms_sql::{validate_identifier, ScriptSource};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const LOB_TABLE: &str = "LOB_COLUMN_UPDATES";
pub const GATHER_LOBS_SCRIPT: &str = "lob/gather_lobs.sql";
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Longest value that still fits a sized `VARCHAR`.
const VARCHAR_LIMIT: i64 = 8000;

/// `ALTER COLUMN` for a column whose longest value is `max_length` characters.
///
/// Empty columns shrink to `CHAR(1)`, anything past 8000 stays `TEXT`.
pub fn alter_column_sql(
    dialect: Dialect,
    schema: &str,
    table: &str,
    column: &str,
    max_length: i64,
) -> String {
    let target = if max_length <= 0 {
        "CHAR(1)".to_string()
    } else if max_length > VARCHAR_LIMIT {
        "TEXT".to_string()
    } else {
        format!("VARCHAR({max_length})")
    };

    match dialect {
        Dialect::Postgres => {
            format!("ALTER TABLE {schema}.{table} ALTER COLUMN {column} TYPE {target}")
        }
        Dialect::SqlServer | Dialect::Sqlite => {
            format!("ALTER TABLE [{schema}].[{table}] ALTER COLUMN [{column}] {target} NULL")
        }
    }
}

/// Whether measuring a column needs a cast to a sized type first.
fn needs_cast(data_type: &str) -> bool {
    matches!(data_type.trim().to_ascii_lowercase().as_str(), "text" | "ntext")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LobColumn {
    schema: String,
    table: String,
    column: String,
    data_type: String,
    current_length: Option<i64>,
    row_count: Option<i64>,
}

impl LobColumn {
    fn from_row(row: RowRef<'_>) -> Self {
        Self {
            schema: row.text("SchemaName").unwrap_or_default(),
            table: row.text("TableName").unwrap_or_default(),
            column: row.text("ColumnName").unwrap_or_default(),
            data_type: row.text("DataType").unwrap_or_default(),
            current_length: row.int("CurrentLength"),
            row_count: row.int("RowCnt"),
        }
    }

    fn label(&self) -> String {
        format!("{}.{}.{}", self.schema, self.table, self.column)
    }

    fn validate(&self) -> Result<(), ImportError> {
        validate_identifier(&self.schema)?;
        validate_identifier(&self.table)?;
        validate_identifier(&self.column)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LobOptions {
    pub db_name: String,
    pub include_empty_tables: bool,
    pub always_include_tables: Vec<String>,
    /// Recorded rows per commit while cataloguing.
    pub batch_size: usize,
}

impl Default for LobOptions {
    fn default() -> Self {
        Self {
            db_name: String::new(),
            include_empty_tables: false,
            always_include_tables: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobReport {
    /// Columns recorded in the tracking table.
    pub cataloged: usize,
    /// Columns skipped because their table is empty.
    pub skipped: usize,
    /// `ALTER` statements applied.
    pub altered: usize,
    /// Columns that could not be measured or recorded.
    pub failures: usize,
}

pub struct LobProcessor {
    options: LobOptions,
    executor: TimedExecutor,
    runner: ScriptRunner,
    scripts: Arc<dyn ScriptSource>,
    errors: ErrorLog,
}

impl LobProcessor {
    pub fn new(
        options: LobOptions,
        executor: TimedExecutor,
        scripts: Arc<dyn ScriptSource>,
        errors: ErrorLog,
    ) -> Self {
        Self {
            options,
            executor,
            runner: ScriptRunner::new(executor),
            scripts,
            errors,
        }
    }

    pub fn with_script_runner(mut self, runner: ScriptRunner) -> Self {
        self.runner = runner;
        self
    }

    pub async fn run(&self, conn: &mut Connection) -> Result<LobReport, ImportError> {
        let db_name = validate_identifier(&self.options.db_name)?.to_string();
        let mut report = LobReport::default();

        self.executor
            .execute(conn, "SELECT 1", &[], Some("health_check"))
            .await
            .map_err(ImportError::HealthCheck)?;

        info!(table = LOB_TABLE, "creating LOB tracking table");
        let sql = self.scripts.load(GATHER_LOBS_SCRIPT)?;
        let name = script_name(GATHER_LOBS_SCRIPT);
        if let ScriptOutcome::Applied { batches } = self.runner.run(conn, name, &sql).await? {
            info!(script = name, batches, "script complete");
        }

        let mut scope = TransactionScope::enter(conn);
        let result = self.catalog(scope.conn(), &db_name, &mut report).await;
        scope.finish(result).await?;
        info!(
            cataloged = report.cataloged,
            skipped = report.skipped,
            failures = report.failures,
            "analyzed LOB columns"
        );

        let mut scope = TransactionScope::enter(conn);
        let result = self.apply(scope.conn(), &db_name, &mut report).await;
        scope.finish(result).await?;

        info!(altered = report.altered, "LOB column processing finished");
        Ok(report)
    }

    fn record_failure(&self, details: &str) {
        error!("{details}");
        self.errors.append(details);
    }

    async fn rollback(&self, conn: &mut Connection, context: &str) {
        if let Err(e) = conn.rollback().await {
            warn!(context, error = %e, "rollback failed");
        }
    }

    /// Measure every large text column and record its `ALTER` statement.
    ///
    /// A failed measurement or insert rolls back the rows recorded since the last
    /// batch commit, is logged, and the next column continues.
    async fn catalog(
        &self,
        conn: &mut Connection,
        db_name: &str,
        report: &mut LobReport,
    ) -> Result<(), ImportError> {
        let dialect = conn.dialect();
        let mut excluded: Vec<&str> = DatabaseKind::ALL.iter().map(|k| k.tables_table()).collect();
        excluded.extend([LOB_TABLE, LEDGER_TABLE]);

        let sql = queries::lob_columns(dialect, db_name, &excluded);
        let rows = self.executor.execute(conn, &sql, &[], Some("lob_columns")).await?;
        let columns: Vec<LobColumn> = rows.iter().map(LobColumn::from_row).collect();

        let filter = TableFilter::for_database(
            db_name,
            self.options.include_empty_tables,
            &self.options.always_include_tables,
        );
        let insert = queries::insert_lob_update(dialect, db_name, LOB_TABLE);
        let batch_size = self.options.batch_size.max(1);
        let mut pending = 0usize;

        for column in &columns {
            let label = column.label();
            if let Err(err) = column.validate() {
                self.record_failure(&format!("Skipping LOB column {label}: {err}"));
                report.failures += 1;
                continue;
            }

            let row_count = match column.row_count {
                Some(n) => n,
                None => match self.count_rows(conn, column).await {
                    Ok(n) => n,
                    Err(message) => {
                        self.rollback(conn, "lob row count").await;
                        pending = 0;
                        self.record_failure(&format!(
                            "Error processing LOB column {label}: {message}"
                        ));
                        report.failures += 1;
                        continue;
                    }
                },
            };
            if !filter.should_process(&column.schema, &column.table, Some(row_count)) {
                info!(column = %label, row_count, "skipping LOB column of empty table");
                report.skipped += 1;
                continue;
            }

            let max_sql = queries::max_length(
                dialect,
                &column.schema,
                &column.table,
                &column.column,
                needs_cast(&column.data_type),
            );
            let max_length = match self.executor.execute(conn, &max_sql, &[], Some("lob_max_length")).await {
                Ok(rows) => rows.first().and_then(|r| r.at(0)).and_then(Value::as_i64).unwrap_or(0),
                Err(err) => {
                    self.rollback(conn, "lob max length").await;
                    pending = 0;
                    self.record_failure(&format!("Error processing LOB column {label}: {err}"));
                    report.failures += 1;
                    continue;
                }
            };

            let alter = alter_column_sql(dialect, &column.schema, &column.table, &column.column, max_length);
            let params = [
                Value::from(column.schema.as_str()),
                Value::from(column.table.as_str()),
                Value::from(column.column.as_str()),
                Value::from(column.data_type.as_str()),
                column.current_length.map(Value::Int).unwrap_or(Value::Null),
                Value::Int(row_count),
                Value::Int(max_length),
                Value::from(alter),
            ];
            if let Err(err) = self.executor.execute(conn, &insert, &params, Some("lob_insert")).await {
                self.rollback(conn, "lob insert").await;
                pending = 0;
                self.record_failure(&format!("Error inserting LOB column {label}: {err}"));
                report.failures += 1;
                continue;
            }

            report.cataloged += 1;
            pending += 1;
            if pending >= batch_size {
                conn.commit()
                    .await
                    .map_err(|e| ImportError::commit(LOB_TABLE, e))?;
                pending = 0;
            }
        }
        Ok(())
    }

    async fn count_rows(&self, conn: &mut Connection, column: &LobColumn) -> Result<i64, String> {
        let sql = queries::count_rows(conn.dialect(), &column.schema, &column.table);
        let rows = self
            .executor
            .execute(conn, &sql, &[], Some("lob_row_count"))
            .await
            .map_err(|e| e.to_string())?;
        Ok(rows.first().and_then(|r| r.int("row_count")).unwrap_or(0))
    }

    /// Apply the recorded statements; the first failure stops the run.
    async fn apply(
        &self,
        conn: &mut Connection,
        db_name: &str,
        report: &mut LobReport,
    ) -> Result<(), ImportError> {
        info!("executing ALTER TABLE statements for LOB columns");
        let sql = queries::lob_alter_statements(conn.dialect(), db_name, LOB_TABLE);
        let rows = self.executor.execute(conn, &sql, &[], Some("lob_alter_statements")).await?;
        let statements: Vec<String> = rows
            .iter()
            .filter_map(|row| row.text("Alter_Statement"))
            .filter(|s| !s.trim().is_empty())
            .collect();

        for (idx, statement) in statements.iter().enumerate().map(|(i, s)| (i + 1, s)) {
            if let Err(err) = self.executor.execute(conn, statement, &[], Some("alter_lob_column")).await {
                self.rollback(conn, "lob alter").await;
                self.record_failure(&format!("Failed to alter column (statement {idx}): {err}"));
                return Err(err.into());
            }
            conn.commit()
                .await
                .map_err(|e| ImportError::commit("alter_lob_column", e))?;
            report.altered += 1;
        }
        Ok(())
    }
}
