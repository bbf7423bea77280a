//! Concord — identity reconciliation engine.
//! Entry point for the `concord` binary.

mod cli;
mod output;
mod pipeline;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use concord_config::ConcordConfig;

fn init_tracing(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Stages => {
            init_tracing("concord=info,warn");
            for name in pipeline::stage_names() {
                println!("{name}");
            }
        }

        Command::Reconcile { query, top, json } => {
            let config = match &cli.config {
                Some(path) => ConcordConfig::load_from(path)?,
                None => ConcordConfig::load()?,
            };
            init_tracing(&config.logging.filter);
            info!("Concord {} starting", env!("CARGO_PKG_VERSION"));

            let engine = pipeline::build_engine(&config)?;
            let query = pipeline::read_query(&query)?;

            // Ctrl-C abandons the call; stages still running contribute nothing.
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted; cancelling reconciliation");
                    on_signal.cancel();
                }
            });

            let outcome = engine.reconcile_with_cancel(&query, cancel).await;
            let rows = output::rows(&outcome, top);
            if json {
                println!("{}", output::render_json(&rows)?);
            } else {
                print!("{}", output::render_table(&rows));
            }
        }
    }

    Ok(())
}
