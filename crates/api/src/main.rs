use std::sync::Arc;

use anyhow::Context;

use cnjflow_api::app::{build_app, services::AppServices};
use cnjflow_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cnjflow_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        AppServices::from_config(&config)
            .await
            .context("failed to initialize services")?,
    );
    let workers = services.spawn_workers();

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("draining background workers");
    for worker in workers {
        worker.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
