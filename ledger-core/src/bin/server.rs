//! Ledger server binary
//!
//! Opens the ledger and keeps it running until interrupted. The transport
//! layer (HTTP/gRPC/CLI) is a separate concern and plugs in on top of the
//! `Ledger` API.

use anyhow::Result;
use ledger_core::{Config, Ledger};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting balance ledger server");

    // Load configuration
    let config = Config::from_env()?;

    // Open ledger
    let ledger = Ledger::open(config).await?;

    let stats = ledger.stats()?;
    tracing::info!(
        accounts = stats.total_accounts,
        reservations = stats.total_reservations,
        transactions = stats.total_transactions,
        "Ledger opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    ledger.shutdown().await?;
    Ok(())
}
