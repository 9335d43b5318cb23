use crate::context::Context;
use crate::error::{connection_error, CliError};
use crate::output;
use crate::style::Style;
use crate::ui::Ui;

pub async fn run(ctx: &Context) -> Result<(), CliError> {
    let mut conn = ctx.connect().await?;
    ctx.executor()
        .execute(&mut conn, "SELECT 1", &[], Some("health_check"))
        .await
        .map_err(|e| connection_error(e.driver_error().clone()))?;
    if let Err(e) = conn.rollback().await {
        tracing::debug!(error = %e, "rollback after health check failed");
    }

    let ui = Ui::new(Style::detect());
    output::line(ui.ok_line("target database reachable"));
    output::line(ui.kv("database", &ctx.settings().db_name));
    output::line(ui.kv("dialect", conn.dialect().as_str()));
    output::line(ui.kv("connection shape", conn.shape().as_str()));
    Ok(())
}
