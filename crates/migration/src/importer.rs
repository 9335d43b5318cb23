use crate::error::ImportError;
use crate::error_log::ErrorLog;
use crate::filter::TableFilter;
use crate::joins::{JoinImporter, NoJoinImport};
use crate::profile::{script_name, DatabaseKind, StepKind};
use crate::progress::{ProgressStore, PK_CREATION, TABLE_OPERATIONS};
use crate::queries;
use predms_db::{Connection, RowRef, RowSet, Value};
use predms_executor::{
    RetryPolicy, ScriptOutcome, ScriptRunner, StepRunner, TimedExecutor, TransactionScope,
};
use predms_sql::{split_script, validate_identifier, ScriptSource, SplitStrategy};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub db_name: String,
    pub include_empty_tables: bool,
    pub always_include_tables: Vec<String>,
    pub skip_pk_creation: bool,
    pub resume: bool,
}

/// Outcome of one importer run.
///
/// `successes` and `failures` count table copies and primary key rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub kind: DatabaseKind,
    pub successes: usize,
    pub failures: usize,
    pub next_step: Option<&'static str>,
}

impl ImportReport {
    fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            successes: 0,
            failures: 0,
            next_step: kind.next_step(),
        }
    }
}

/// One row of the tables-to-convert list.
#[derive(Debug, Clone)]
struct TableOperation {
    row_id: Option<i64>,
    schema: String,
    table: String,
    drop_sql: String,
    select_into: String,
}

impl TableOperation {
    fn from_row(row: RowRef<'_>) -> Self {
        Self {
            row_id: row.int("RowID"),
            schema: row.text("SchemaName").unwrap_or_default(),
            table: row.text("TableName").unwrap_or_default(),
            drop_sql: row.text("Drop_IfExists").unwrap_or_default(),
            select_into: row.text("Select_Into").unwrap_or_default(),
        }
    }

    fn label(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Runs the full migration of one legacy database into the target.
///
/// Phases, in order: progress reset, health check, preprocessing, drop/select
/// generation, join import, join update, table copies, empty table cleanup and
/// primary key creation. Failures of a single table copy or primary key row are
/// rolled back, appended to the error log and counted; every other failure
/// stops the run.
pub struct Importer {
    kind: DatabaseKind,
    options: ImportOptions,
    executor: TimedExecutor,
    runner: ScriptRunner,
    steps: StepRunner,
    scripts: Arc<dyn ScriptSource>,
    progress: Box<dyn ProgressStore>,
    errors: ErrorLog,
    joins: Box<dyn JoinImporter>,
}

impl Importer {
    pub fn new(
        kind: DatabaseKind,
        options: ImportOptions,
        executor: TimedExecutor,
        scripts: Arc<dyn ScriptSource>,
        progress: Box<dyn ProgressStore>,
        errors: ErrorLog,
    ) -> Self {
        Self {
            kind,
            options,
            executor,
            runner: ScriptRunner::new(executor),
            steps: StepRunner::new(executor, RetryPolicy::default()),
            scripts,
            progress,
            errors,
            joins: Box::new(NoJoinImport),
        }
    }

    pub fn with_script_runner(mut self, runner: ScriptRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_step_runner(mut self, steps: StepRunner) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_join_importer(mut self, joins: Box<dyn JoinImporter>) -> Self {
        self.joins = joins;
        self
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub async fn run(&mut self, conn: &mut Connection) -> Result<ImportReport, ImportError> {
        let db_name = validate_identifier(&self.options.db_name)?.to_string();
        let mut report = ImportReport::new(self.kind);

        info!(kind = self.kind.as_str(), db = %db_name, resume = self.options.resume, "starting import");

        if !self.options.resume {
            self.progress.clear()?;
        }

        self.health_check(conn).await?;

        info!(kind = self.kind.as_str(), "defining conversion scope");
        let mut scope = TransactionScope::enter(conn);
        let result = self.preprocess(scope.conn()).await;
        scope.finish(result).await?;

        info!(kind = self.kind.as_str(), "gathering tables to convert");
        self.run_script(conn, self.kind.drop_select_script()).await?;

        self.joins.import(conn, self.kind).await?;

        info!(kind = self.kind.as_str(), "updating joins");
        self.run_script(conn, self.kind.update_joins_script()).await?;

        self.table_operations(conn, &db_name, &mut report).await?;
        self.drop_empty_tables(conn, &db_name).await?;

        if self.options.skip_pk_creation {
            info!(kind = self.kind.as_str(), "skipping primary key and constraint creation");
        } else {
            self.create_primary_keys(conn, &db_name, &mut report).await?;
        }

        self.progress.clear()?;
        info!(
            kind = self.kind.as_str(),
            successes = report.successes,
            failures = report.failures,
            next_step = report.next_step.unwrap_or("none"),
            "import finished"
        );
        Ok(report)
    }

    async fn health_check(&self, conn: &mut Connection) -> Result<(), ImportError> {
        self.steps
            .run_step(conn, "health_check", "SELECT 1", &[])
            .await
            .map_err(ImportError::HealthCheck)?;
        Ok(())
    }

    async fn preprocess(&self, conn: &mut Connection) -> Result<(), ImportError> {
        for step in self.kind.preprocessing() {
            let sql = self.scripts.load(step.path)?;
            match step.kind {
                StepKind::Script => {
                    self.runner.run(conn, step.name, &sql).await?;
                }
                StepKind::Retried => {
                    self.steps.run_with_retry(conn, step.name, &sql, &[]).await?;
                    conn.commit()
                        .await
                        .map_err(|e| ImportError::commit(step.name, e))?;
                }
            }
        }
        Ok(())
    }

    async fn run_script(&self, conn: &mut Connection, path: &str) -> Result<(), ImportError> {
        let sql = self.scripts.load(path)?;
        let name = script_name(path);
        if let ScriptOutcome::Applied { batches } = self.runner.run(conn, name, &sql).await? {
            info!(script = name, batches, "script complete");
        }
        Ok(())
    }

    fn filter(&self, db_name: &str) -> TableFilter {
        TableFilter::new(
            self.kind,
            db_name,
            self.options.include_empty_tables,
            &self.options.always_include_tables,
        )
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

    async fn table_operations(
        &mut self,
        conn: &mut Connection,
        db_name: &str,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        info!(kind = self.kind.as_str(), "executing table operations (drop/select)");
        let before = (report.successes, report.failures);

        let mut scope = TransactionScope::enter(conn);
        let result = self.table_operation_rows(scope.conn(), db_name, report).await;
        scope.finish(result).await?;

        info!(
            successful = report.successes - before.0,
            failed = report.failures - before.1,
            "table operations completed"
        );
        Ok(())
    }

    async fn table_operation_rows(
        &mut self,
        conn: &mut Connection,
        db_name: &str,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let sql = queries::table_operations(conn.dialect(), db_name, self.kind.tables_table());
        let rows = match self.executor.execute(conn, &sql, &[], Some("table_operations")).await {
            Ok(rows) => rows,
            Err(err) => {
                self.record_failure(&format!("Fatal query error: {err}"));
                return Err(err.into());
            }
        };

        let operations: Vec<TableOperation> = rows.iter().map(TableOperation::from_row).collect();
        let start = self.progress.get(TABLE_OPERATIONS);
        if start > 0 {
            info!(resume_after = start, total = operations.len(), "resuming table operations");
        }

        for (idx, op) in operations.iter().enumerate().map(|(i, op)| (i + 1, op)) {
            if idx <= start {
                continue;
            }

            match self.copy_table(conn, db_name, idx, op).await {
                Ok(()) => {
                    report.successes += 1;
                    self.progress.update(TABLE_OPERATIONS, idx)?;
                }
                Err(err) => {
                    self.rollback(conn, "table operation").await;
                    self.record_failure(&format!(
                        "SQL execution error for row {idx} ({}): {err}",
                        op.label()
                    ));
                    report.failures += 1;
                }
            }
        }
        Ok(())
    }

    async fn copy_table(
        &self,
        conn: &mut Connection,
        db_name: &str,
        idx: usize,
        op: &TableOperation,
    ) -> Result<(), ImportError> {
        validate_identifier(&op.schema)?;
        validate_identifier(&op.table)?;

        if op.drop_sql.trim().is_empty() {
            return Ok(());
        }

        let label = format!("{}.{}", self.kind.as_str(), op.label());
        info!(row = idx, table = %label, "drop if exists");
        self.steps.run_with_retry(conn, &label, &op.drop_sql, &[]).await?;
        // a retried select-into rolls back, which must not resurrect the dropped table
        conn.commit()
            .await
            .map_err(|e| ImportError::commit(label.clone(), e))?;

        if !op.select_into.trim().is_empty() {
            info!(row = idx, table = %label, "select into");
            self.steps.run_with_retry(conn, &label, &op.select_into, &[]).await?;
        }

        conn.commit()
            .await
            .map_err(|e| ImportError::commit(label.clone(), e))?;

        self.refresh_row_count(conn, db_name, op).await;
        Ok(())
    }

    /// Store the copied row count back into the tables-to-convert list.
    ///
    /// Failures are logged; the copy itself has already been committed.
    async fn refresh_row_count(&self, conn: &mut Connection, db_name: &str, op: &TableOperation) {
        let Some(row_id) = op.row_id else {
            return;
        };

        let dialect = conn.dialect();
        let target = self.kind.target_table(&op.table);
        let count_sql = queries::count_rows(dialect, &op.schema, &target);
        let count = match self.executor.execute(conn, &count_sql, &[], Some("row_count")).await {
            Ok(rows) => first_int(&rows),
            Err(err) => {
                warn!(table = %op.label(), error = %err, "could not count copied rows");
                self.rollback(conn, "row count").await;
                return;
            }
        };
        let Some(count) = count else {
            return;
        };

        let update = queries::update_scope_row_count(dialect, db_name, self.kind.tables_table());
        let params = [Value::Int(count), Value::Int(row_id)];
        let result = match self.executor.execute(conn, &update, &params, Some("scope_row_count")).await {
            Ok(_) => conn.commit().await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };

        if let Err(message) = result {
            self.rollback(conn, "row count update").await;
            self.record_failure(&format!("Failed to update row count for RowID {row_id}: {message}"));
        }
    }

    async fn drop_empty_tables(&self, conn: &mut Connection, db_name: &str) -> Result<(), ImportError> {
        if self.options.include_empty_tables {
            info!("keeping empty tables");
            return Ok(());
        }

        let sql = queries::empty_tables(conn.dialect(), db_name, self.kind.tables_table());
        let rows = match self.executor.execute(conn, &sql, &[], Some("empty_tables")).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "could not fetch empty tables");
                self.rollback(conn, "empty tables").await;
                return Ok(());
            }
        };

        let filter = self.filter(db_name);
        let mut scope = TransactionScope::enter(conn);
        let result = self.drop_tables(scope.conn(), &filter, &rows).await;
        scope.finish(result).await
    }

    async fn drop_tables(
        &self,
        conn: &mut Connection,
        filter: &TableFilter,
        rows: &RowSet,
    ) -> Result<(), ImportError> {
        let dialect = conn.dialect();
        for row in rows.iter() {
            let schema = row.text("SchemaName").unwrap_or_default();
            let table = row.text("TableName").unwrap_or_default();
            if let Err(err) = validate_identifier(&schema).and(validate_identifier(&table)) {
                self.record_failure(&format!("Skipping empty table {schema}.{table}: {err}"));
                continue;
            }
            if filter.is_always_included(&schema, &table) {
                continue;
            }

            let target = self.kind.target_table(&table);
            let sql = queries::drop_table(dialect, &schema, &target);
            info!(table = %format!("{schema}.{target}"), "dropping empty table");
            if let Err(err) = self.steps.run_step(conn, "drop_empty_table", &sql, &[]).await {
                self.record_failure(&format!("Error dropping table {schema}.{target}: {err}"));
            }
        }
        Ok(())
    }

    async fn create_primary_keys(
        &mut self,
        conn: &mut Connection,
        db_name: &str,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        info!(kind = self.kind.as_str(), "generating primary keys and NOT NULL columns");
        self.run_primary_key_script(conn).await?;

        let pk_table = self.kind.primary_key_table();
        let exists_sql = queries::table_exists(conn.dialect());
        let exists = self
            .executor
            .execute(conn, &exists_sql, &[Value::from(pk_table)], None)
            .await
            .map(|rows| !rows.is_empty())
            .unwrap_or_else(|err| {
                error!(table = pk_table, error = %err, "could not verify primary key table");
                false
            });
        if !exists {
            let err = ImportError::MissingPrimaryKeyTable {
                table: pk_table.to_string(),
            };
            self.record_failure(&format!("Critical error: {err}"));
            return Err(err);
        }

        let filter = self.filter(db_name);
        let mut scope = TransactionScope::enter(conn);
        let result = self.primary_key_rows(scope.conn(), db_name, &filter, report).await;
        scope.finish(result).await?;

        info!(kind = self.kind.as_str(), "primary key and NOT NULL statements executed");
        Ok(())
    }

    /// The generator script runs one `;` statement at a time, committing each.
    async fn run_primary_key_script(&self, conn: &mut Connection) -> Result<(), ImportError> {
        let path = self.kind.primary_key_script();
        let sql = self.scripts.load(path)?;
        let name = script_name(path);
        let statements = split_script(&sql, SplitStrategy::Statements);

        for stmt in &statements {
            if let Err(err) = self.executor.execute(conn, stmt.sql(), &[], Some(name)).await {
                self.rollback(conn, name).await;
                self.record_failure(&format!(
                    "Error executing statement {} of {}: {err}\n\nStatement: {}",
                    stmt.ordinal,
                    statements.len(),
                    stmt.sql()
                ));
                return Err(err.into());
            }
            conn.commit()
                .await
                .map_err(|e| ImportError::commit(name, e))?;
        }
        Ok(())
    }

    async fn primary_key_rows(
        &mut self,
        conn: &mut Connection,
        db_name: &str,
        filter: &TableFilter,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let sql = queries::primary_keys(
            conn.dialect(),
            db_name,
            self.kind.primary_key_table(),
            self.kind.tables_table(),
        );
        let rows = match self.executor.execute(conn, &sql, &[], Some("primary_keys")).await {
            Ok(rows) => rows,
            Err(err) => {
                self.record_failure(&format!("Error executing PK rows query: {err}"));
                return Ok(());
            }
        };

        let start = self.progress.get(PK_CREATION);
        for (idx, row) in rows.iter().enumerate().map(|(i, row)| (i + 1, row)) {
            if idx <= start {
                continue;
            }

            let schema = row.text("SchemaName").unwrap_or_default();
            let table = row.text("TableName").unwrap_or_default();
            let script = row.text("Script").unwrap_or_default();
            let label = format!("{}.{schema}.{table}", self.kind.as_str());

            if filter.should_process(&schema, &table, row.int("ScopeRowCount")) {
                info!(row = idx, table = %label, "pk creation");
                let result = match self.executor.execute(conn, &script, &[], Some(label.as_str())).await {
                    Ok(_) => conn.commit().await.map_err(|e| e.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                match result {
                    Ok(()) => report.successes += 1,
                    Err(message) => {
                        self.rollback(conn, "pk creation").await;
                        self.record_failure(&format!(
                            "Error executing PK statements for row {idx} ({label}): {message}"
                        ));
                        report.failures += 1;
                    }
                }
            }

            self.progress.update(PK_CREATION, idx)?;
        }
        Ok(())
    }
}

fn first_int(rows: &RowSet) -> Option<i64> {
    rows.first().and_then(|row| row.at(0)).and_then(Value::as_i64)
}
