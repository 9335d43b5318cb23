use clap::{Parser, Subcommand};
use predms_config::Overrides;
use predms_migration::DatabaseKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "predms", version, about = "Migrate legacy Justice, Operations and Financial databases")]
pub struct Cli {
    /// JSON config file (overrides ETL_CONFIG_FILE).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Target connection string (overrides MSSQL_TARGET_CONN_STR).
    #[arg(long, global = true)]
    pub conn: Option<String>,

    /// Target database name (overrides MSSQL_TARGET_DB_NAME).
    #[arg(long, global = true)]
    pub db_name: Option<String>,

    /// Continue table and primary key loops from the saved progress file.
    #[arg(long, global = true)]
    pub resume: bool,

    /// Connection shape: `statement` or `cursor`.
    #[arg(long, global = true)]
    pub shape: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            conn_str: self.conn.clone(),
            db_name: self.db_name.clone(),
            resume: self.resume,
            shape: self.shape.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one importer.
    Run(RunArgs),
    /// Run all importers, then LOB column processing, stopping at the first failure.
    RunAll,
    /// List applied scripts.
    Status,
    /// Delete every migration history record.
    ClearHistory(ClearHistoryArgs),
    /// Check connectivity to the target.
    Check,
}

/// What `predms run` executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    Import(DatabaseKind),
    Lob,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// justice, operations, financial or lob
    #[arg(value_parser = parse_target)]
    pub target: RunTarget,
}

#[derive(Parser, Debug, Clone)]
pub struct ClearHistoryArgs {
    #[arg(long)]
    pub yes: bool,
}

fn parse_target(value: &str) -> Result<RunTarget, String> {
    if value.trim().eq_ignore_ascii_case("lob") {
        return Ok(RunTarget::Lob);
    }
    DatabaseKind::parse(value)
        .map(RunTarget::Import)
        .ok_or_else(|| format!("unknown target '{value}' (expected justice, operations, financial or lob)"))
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, RunTarget};
    use clap::Parser;
    use predms_migration::DatabaseKind;

    #[test]
    fn parses_run_with_global_flags() {
        let cli = Cli::parse_from(["predms", "run", "Operations", "--resume", "--shape", "statement"]);
        match &cli.command {
            Command::Run(args) => assert_eq!(args.target, RunTarget::Import(DatabaseKind::Operations)),
            other => panic!("unexpected command {other:?}"),
        }
        let overrides = cli.overrides();
        assert!(overrides.resume);
        assert_eq!(overrides.shape.as_deref(), Some("statement"));
    }

    #[test]
    fn rejects_unknown_target() {
        assert!(Cli::try_parse_from(["predms", "run", "archive"]).is_err());
    }

    #[test]
    fn lob_is_a_run_target() {
        let cli = Cli::parse_from(["predms", "run", "LOB"]);
        assert!(matches!(cli.command, Command::Run(ref a) if a.target == RunTarget::Lob));
    }

    #[test]
    fn clear_history_defaults_to_unconfirmed() {
        let cli = Cli::parse_from(["predms", "clear-history"]);
        assert!(matches!(cli.command, Command::ClearHistory(ref a) if !a.yes));
    }
}
