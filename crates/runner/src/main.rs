use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use pf_cloud::CloudConnection;
use pf_domain::config::{LogFormat, LoggingConfig};
use pf_runner::cli::{Cli, Command, DEFAULT_LINGER_MS};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to run when no subcommand is given.
        None => run(DEFAULT_LINGER_MS).await,
        Some(Command::Run { linger_ms }) => run(linger_ms).await,
        Some(Command::Validate) => {
            let (config, config_path) = pf_runner::cli::load_config()?;
            if !pf_runner::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn run(linger_ms: u64) -> anyhow::Result<()> {
    let (config, config_path) = pf_runner::cli::load_config()?;
    init_tracing(&config.logging);
    tracing::info!(config = %config_path, nodes = config.nodes.len(), "particle-flow starting");
    pf_runner::cli::config::log_issues(&config);

    let connection = CloudConnection::from_config(&config.cloud).context("creating cloud client")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = tokio::io::stdout();
    pf_runner::flow::run(
        &config,
        Arc::new(connection),
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
        shutdown,
        Duration::from_millis(linger_ms),
    )
    .await?;

    tracing::info!("particle-flow stopped");
    Ok(())
}

/// Install the global subscriber. Logs go to stderr; stdout carries
/// outbound messages. `RUST_LOG` overrides the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }
}
