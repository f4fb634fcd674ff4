//! Point ledger service binary

use point_ledger::{Config, PointLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting point ledger");

    // Load configuration
    let config = match std::env::var("POINT_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    let ledger = PointLedger::in_memory(config)?;
    tracing::info!(
        service = %ledger.config().service_name,
        version = %ledger.config().service_version,
        lock_timeout_ms = ledger.locks().timeout().as_millis() as u64,
        "Ledger ready"
    );

    tokio::signal::ctrl_c().await?;

    ledger.shutdown();
    tracing::info!(metrics = %ledger.metrics().render()?, "Final metrics");
    Ok(())
}
