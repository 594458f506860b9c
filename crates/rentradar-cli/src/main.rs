use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rentradar_core::Source;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rentradar")]
#[command(about = "Rental listing ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API server.
    Serve,
    /// Trigger one parse run and wait for its terminal state.
    Dispatch { source: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => rentradar_web::serve_from_env().await?,
        Commands::Dispatch { source } => {
            let Some(source) = Source::parse(&source) else {
                bail!("unknown source {source:?}; known sources: cian, avito, yandex");
            };
            let state = rentradar_web::AppState::from_env()?;
            let run_id = state.dispatcher.dispatch(source).await;
            println!("dispatched run {run_id} for {source}");

            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let Some(run) = state.runs.get(run_id).await else {
                    bail!("run {run_id} disappeared");
                };
                if run.status.is_terminal() {
                    println!(
                        "run {} {}: found={} new={} updated={}{}",
                        run.id,
                        run.status,
                        run.apartments_found,
                        run.apartments_new,
                        run.apartments_updated,
                        run.error_message
                            .map(|e| format!(" error={e}"))
                            .unwrap_or_default()
                    );
                    break;
                }
            }
        }
    }

    Ok(())
}
