use std::sync::Arc;

use anyhow::Context;

use stockhold_api::config::ApiConfig;
use stockhold_core::SystemClock;
use stockhold_infra::store::JsonFileStore;
use stockhold_infra::upstream::HttpGateway;
use stockhold_infra::{EngineConfig, ReservationEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockhold_observability::init();

    let api = ApiConfig::from_env()?;
    let engine_config = EngineConfig::from_env().context("engine configuration")?;

    let store = Arc::new(JsonFileStore::new(&api.data_dir));
    let gateway = Arc::new(
        HttpGateway::new(&api.upstream_base_url, api.request_timeout)
            .context("building upstream HTTP client")?,
    );
    let engine = ReservationEngine::builder(store, gateway, Arc::new(SystemClock::new()))
        .config(engine_config)
        .build()
        .await
        .context("starting reservation engine")?;
    let engine = Arc::new(engine);

    let workers = engine.spawn_workers();
    let app = stockhold_api::app::build_app(engine.clone());

    let listener = tokio::net::TcpListener::bind(api.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", api.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, data_dir = %api.data_dir.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server")?;

    for worker in workers {
        worker.shutdown().await;
    }
    Ok(())
}
