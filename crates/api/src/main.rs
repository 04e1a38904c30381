use std::sync::Arc;

use anyhow::Context;

use insight_infra::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load().context("failed to load configuration")?;
    insight_observability::init_with(&config.log_filter);

    let bind_addr = config.bind_addr()?;
    let services = insight_api::app::services::build_services(config)
        .context("failed to wire analytics pipelines")?;
    let app = insight_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
