use crate::args::RunTarget;
use crate::context::Context;
use crate::error::{import_error, CliError};
use crate::output;
use crate::style::Style;
use crate::ui::Ui;
use predms_migration::{DatabaseKind, ImportReport, LobReport};
use tracing::info;

pub async fn run(ctx: &Context, target: RunTarget) -> Result<(), CliError> {
    match target {
        RunTarget::Import(kind) => import(ctx, kind).await.map(|_| ()),
        RunTarget::Lob => lob(ctx).await.map(|_| ()),
    }
}

pub async fn import(ctx: &Context, kind: DatabaseKind) -> Result<ImportReport, CliError> {
    let mut conn = ctx.connect().await?;
    let report = ctx
        .importer(kind)
        .run(&mut conn)
        .await
        .map_err(import_error)?;

    let ui = Ui::new(Style::detect());
    for line in report_lines(&ui, &report) {
        output::line(line);
    }
    Ok(report)
}

pub async fn lob(ctx: &Context) -> Result<LobReport, CliError> {
    let mut conn = ctx.connect().await?;
    let report = ctx
        .lob_processor()
        .run(&mut conn)
        .await
        .map_err(import_error)?;

    let ui = Ui::new(Style::detect());
    for line in lob_report_lines(&ui, &report) {
        output::line(line);
    }
    Ok(report)
}

/// Justice, Operations, Financial, then LOB columns; the first error stops the chain.
pub async fn run_all(ctx: &Context) -> Result<(), CliError> {
    for kind in DatabaseKind::ALL {
        info!(kind = kind.as_str(), "starting migration");
        import(ctx, kind).await?;
    }
    info!("starting LOB column processing");
    lob(ctx).await?;
    Ok(())
}

fn report_lines(ui: &Ui, report: &ImportReport) -> Vec<String> {
    let mut lines = ui.header(&format!("{} migration", report.kind));
    lines.push(ui.kv("tables/keys ok", &report.successes.to_string()));
    lines.push(ui.kv("failed", &report.failures.to_string()));

    if report.failures == 0 {
        lines.push(ui.ok_line("completed"));
    } else {
        lines.push(ui.failed_line(&format!(
            "completed with {} failure(s); see the {} error log",
            report.failures,
            report.kind.slug()
        )));
    }
    if let Some(next) = report.next_step {
        lines.push(ui.info_line(&format!("next: {next}")));
    }
    lines
}

fn lob_report_lines(ui: &Ui, report: &LobReport) -> Vec<String> {
    let mut lines = ui.header("LOB column processing");
    lines.push(ui.kv("columns recorded", &report.cataloged.to_string()));
    lines.push(ui.kv("empty, skipped", &report.skipped.to_string()));
    lines.push(ui.kv("columns altered", &report.altered.to_string()));

    if report.failures == 0 {
        lines.push(ui.ok_line("ready for transfer"));
    } else {
        lines.push(ui.failed_line(&format!(
            "{} column(s) could not be analyzed; see the lob error log",
            report.failures
        )));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{lob_report_lines, report_lines};
    use crate::style::Style;
    use crate::ui::Ui;
    use predms_migration::{DatabaseKind, ImportReport, LobReport};

    #[test]
    fn financial_report_points_at_lob_processing() {
        let ui = Ui::new(Style::plain());
        let lines = report_lines(
            &ui,
            &ImportReport {
                kind: DatabaseKind::Financial,
                successes: 4,
                failures: 1,
                next_step: DatabaseKind::Financial.next_step(),
            },
        );

        assert!(lines.contains(&ui.kv("failed", "1")));
        assert!(lines.iter().any(|l| l.contains("see the financial error log")));
        assert_eq!(lines.last(), Some(&ui.info_line("next: LOB column processing")));
    }

    #[test]
    fn lob_report_lists_every_count() {
        let ui = Ui::new(Style::plain());
        let lines = lob_report_lines(
            &ui,
            &LobReport {
                cataloged: 3,
                skipped: 1,
                altered: 3,
                failures: 0,
            },
        );

        assert!(lines.contains(&ui.kv("columns altered", "3")));
        assert_eq!(lines.last(), Some(&ui.ok_line("ready for transfer")));
    }
}
