use crate::error::CliError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::fs::{self, OpenOptions};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: `RUST_LOG` (default `info`) to stderr, plus
/// an uncoloured copy in `log_file` when one is configured.
pub fn init(log_file: Option<&Path>) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| log_file_error(path, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| log_file_error(path, e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    Ok(())
}

fn log_file_error(path: &Path, err: std::io::Error) -> CliError {
    CliError::user_error("Cannot open log file")
        .with_reason(format!("{}: {err}", path.display()))
        .with_action("Fix log_file in the config file or remove it.")
}

/// Serve `/metrics` for Prometheus on `port`.
pub fn install_prometheus(port: u16) -> Result<(), CliError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            CliError::user_error("Cannot start the Prometheus exporter")
                .with_reason(e.to_string())
                .with_action("Choose a free PROMETHEUS_PORT or unset it.")
        })?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Root span for one invocation; every event carries its `correlation_id`.
pub fn run_span(command: &str) -> Span {
    let correlation_id = uuid::Uuid::new_v4();
    tracing::info_span!("run", command, %correlation_id)
}
