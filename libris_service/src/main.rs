use tracing::info;

use libris_service::{Catalog, config::AppConfig, error::AppResult, tracing::tracer::Tracer};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = AppConfig::get();

    Tracer::install(config)?;

    info!(
        "Starting {} v{}",
        config.distribution.name,
        config.distribution.version.as_deref().unwrap_or("unknown"),
    );

    let catalog = Catalog::new(config);
    info!(
        worker_number = config.node.worker_number,
        buffer = ?config.broadcast.buffer,
        "catalog ready"
    );

    tokio::signal::ctrl_c().await?;

    catalog.shutdown();

    Ok(())
}
