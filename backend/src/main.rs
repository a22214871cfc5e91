//! Alufab back office - stock ledger command runner
//!
//! Reads newline-delimited JSON commands from stdin and writes one JSON
//! response per line to stdout. Logs go to stderr.

use std::sync::Arc;

use alufab_backend::commands::CommandHandler;
use alufab_backend::services::{GlassService, StockLedgerService};
use alufab_backend::store::{MemoryRecordStore, RecordStore};
use alufab_backend::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!("Starting Alufab stock ledger");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let ledger = StockLedgerService::new(store, &config.ledger)?;
    let glass = GlassService::new(&config.glass)?;
    let handler = CommandHandler::new(ledger, glass);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handler.handle_line(&line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}
