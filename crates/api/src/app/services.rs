use std::sync::Arc;

use axum::http::StatusCode;

use insight_infra::{AnalyticsPipelines, EngineConfig, PipelineError};

use crate::app::errors;

/// Shared state handed to every handler through an `Extension`.
pub struct AppServices {
    pipelines: AnalyticsPipelines,
}

impl AppServices {
    pub fn new(pipelines: AnalyticsPipelines) -> Self {
        Self { pipelines }
    }

    pub fn pipelines(&self) -> &AnalyticsPipelines {
        &self.pipelines
    }
}

pub fn build_services(config: EngineConfig) -> Result<AppServices, PipelineError> {
    Ok(AppServices::new(AnalyticsPipelines::from_config(config)?))
}

/// Runs a pipeline call on the blocking pool; pipelines are CPU-bound and
/// synchronous.
pub async fn blocking<T, F>(services: Arc<AppServices>, f: F) -> Result<T, axum::response::Response>
where
    T: Send + 'static,
    F: FnOnce(&AnalyticsPipelines) -> Result<T, PipelineError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(services.pipelines())).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "pipeline request failed");
            Err(errors::pipeline_error_to_response(e))
        }
        Err(join) => {
            tracing::error!(error = %join, "pipeline task aborted");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "pipeline task aborted",
            ))
        }
    }
}
