use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_cron_relay::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so streamed output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            a3s_cron_relay::cli::serve::execute(host.as_deref(), port).await?;
        }
        Commands::Explain {
            expression,
            terse,
            server,
            json,
        } => {
            a3s_cron_relay::cli::explain::execute(expression.as_deref(), terse, &server, json)
                .await?;
        }
        Commands::Generate {
            description,
            server,
        } => {
            a3s_cron_relay::cli::generate::execute(&description, &server).await?;
        }
        Commands::Validate { expression } => {
            a3s_cron_relay::cli::validate::execute(&expression)?;
        }
        Commands::Init { force } => {
            a3s_cron_relay::cli::init::execute(force)?;
        }
    }

    Ok(())
}
