use crate::error::{connection_error, CliError};
use predms_config::Settings;
use predms_db::Connection;
use predms_executor::{
    Fanout, MetricsCounters, MetricsSink, OperationCounts, RetryPolicy, ScriptRunner, StepRunner,
    TimedExecutor,
};
use predms_migration::{
    DatabaseKind, ErrorLog, ImportOptions, Importer, LobOptions, LobProcessor, ProgressTracker,
};
use predms_sql::DirectorySource;
use std::sync::Arc;
use tracing::info;

/// Settings plus the shared metrics sinks for one invocation.
pub struct Context {
    settings: Settings,
    counts: Arc<OperationCounts>,
    metrics: Arc<dyn MetricsSink>,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        let counts = Arc::new(OperationCounts::new());
        let metrics = Fanout::new()
            .with(counts.clone())
            .with(Arc::new(MetricsCounters));

        Self {
            settings,
            counts,
            metrics: Arc::new(metrics),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn counts(&self) -> &OperationCounts {
        &self.counts
    }

    pub fn executor(&self) -> TimedExecutor {
        TimedExecutor::new(self.settings.sql_timeout)
    }

    pub fn script_runner(&self) -> ScriptRunner {
        ScriptRunner::new(self.executor())
            .with_commit_policy(self.settings.commit_policy)
            .with_metrics(self.metrics.clone())
    }

    pub fn step_runner(&self) -> StepRunner {
        StepRunner::new(self.executor(), RetryPolicy::new(self.settings.max_retry_attempts))
            .with_metrics(self.metrics.clone())
    }

    pub async fn connect(&self) -> Result<Connection, CliError> {
        predms_db::connect(&self.settings.conn_str, self.settings.shape, Some(false))
            .await
            .map_err(connection_error)
    }

    pub fn importer(&self, kind: DatabaseKind) -> Importer {
        let s = &self.settings;
        let options = ImportOptions {
            db_name: s.db_name.clone(),
            include_empty_tables: s.include_empty_tables,
            always_include_tables: s.always_include_tables.clone(),
            skip_pk_creation: s.skip_pk_creation,
            resume: s.resume,
        };
        let scripts = DirectorySource::new(&s.scripts_dir).with_db_name(&s.db_name);
        let progress = ProgressTracker::open(s.progress_file_for(kind.slug()));

        Importer::new(
            kind,
            options,
            self.executor(),
            Arc::new(scripts),
            Box::new(progress),
            ErrorLog::for_kind(&s.log_dir, kind),
        )
        .with_script_runner(self.script_runner())
        .with_step_runner(self.step_runner())
    }

    pub fn lob_processor(&self) -> LobProcessor {
        let s = &self.settings;
        let options = LobOptions {
            db_name: s.db_name.clone(),
            include_empty_tables: s.include_empty_tables,
            always_include_tables: s.always_include_tables.clone(),
            batch_size: s.batch_size,
        };
        let scripts = DirectorySource::new(&s.scripts_dir).with_db_name(&s.db_name);

        LobProcessor::new(
            options,
            self.executor(),
            Arc::new(scripts),
            ErrorLog::new(s.log_dir.join("lob_errors.log")),
        )
        .with_script_runner(self.script_runner())
    }

    /// Final summary line of every invocation.
    pub fn report_totals(&self) {
        info!(
            successes = self.counts.successes(),
            failures = self.counts.failures(),
            "run completed successes={} failures={}",
            self.counts.successes(),
            self.counts.failures()
        );
    }
}
