use crate::context::Context;
use crate::error::{ledger_error, CliError};
use crate::output;
use crate::style::Style;
use crate::ui::Ui;
use predms_executor::MigrationLedger;

pub async fn run(ctx: &Context) -> Result<(), CliError> {
    let mut conn = ctx.connect().await?;
    let records = MigrationLedger::new()
        .applied(&mut conn)
        .await
        .map_err(ledger_error)?;

    let ui = Ui::new(Style::detect());
    for line in ui.header("migration history") {
        output::line(line);
    }
    for record in &records {
        output::line(ui.list_item(
            &record.script_name,
            record.applied_at.as_deref().unwrap_or("-"),
        ));
    }
    output::line(ui.kv("applied", &records.len().to_string()));
    Ok(())
}
