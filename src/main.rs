use clap::Parser;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = predms_cli::Cli::parse();

    let result = match predms_cli::start(&cli) {
        Ok(ctx) => predms_cli::dispatch(&ctx, &cli.command).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        predms_cli::error_view::print(&err);
        std::process::exit(err.exit_code());
    }
}
