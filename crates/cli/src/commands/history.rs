use crate::args::ClearHistoryArgs;
use crate::context::Context;
use crate::error::{ledger_error, CliError};
use crate::output;
use crate::style::Style;
use crate::ui::Ui;
use predms_executor::MigrationLedger;
use tracing::warn;

pub async fn clear(ctx: &Context, args: &ClearHistoryArgs) -> Result<(), CliError> {
    if !args.yes {
        return Err(CliError::user_error("Refusing to clear migration history")
            .with_meaning("Every script would run again on the next migration.")
            .with_action("Re-run with --yes to confirm."));
    }

    let mut conn = ctx.connect().await?;
    MigrationLedger::new()
        .clear(&mut conn)
        .await
        .map_err(ledger_error)?;

    warn!(db = %ctx.settings().db_name, "migration history cleared");
    output::line(Ui::new(Style::detect()).ok_line("migration history cleared"));
    Ok(())
}
