pub mod args;
pub mod commands;
pub mod context;
pub mod error;
pub mod error_view;
pub mod output;
pub mod style;
pub mod telemetry;
pub mod ui;

pub use args::{ClearHistoryArgs, Cli, Command, RunArgs, RunTarget};
pub use context::Context;
pub use error::{CliError, ExitCode};

use predms_config::Settings;
use predms_executor::MetricsCounters;
use tracing::Instrument;

/// Load settings and install logging and metrics.
pub fn start(cli: &Cli) -> Result<Context, CliError> {
    let settings = Settings::load(&cli.overrides())?;
    telemetry::init(settings.log_file.as_deref())?;

    MetricsCounters::describe();
    if let Some(port) = settings.prometheus_port {
        telemetry::install_prometheus(port)?;
    }

    Ok(Context::new(settings))
}

pub async fn dispatch(ctx: &Context, command: &Command) -> Result<(), CliError> {
    let name = match command {
        Command::Run(_) => "run",
        Command::RunAll => "run-all",
        Command::Status => "status",
        Command::ClearHistory(_) => "clear-history",
        Command::Check => "check",
    };

    let span = telemetry::run_span(name);
    let result = async {
        match command {
            Command::Run(args) => commands::run::run(ctx, args.target).await,
            Command::RunAll => commands::run::run_all(ctx).await,
            Command::Status => commands::status::run(ctx).await,
            Command::ClearHistory(args) => commands::history::clear(ctx, args).await,
            Command::Check => commands::check::run(ctx).await,
        }
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| ctx.report_totals());
    result
}
