use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use insight_core::{CompanyId, Scope, WarehouseId};
use insight_infra::{AnalyticsPipelines, PipelineError, PipelineRun, Stored};

use crate::app::dto;
use crate::app::errors;
use crate::app::services::{self, AppServices};

/// Unwraps a JSON body or turns the rejection into a 400.
pub fn body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(b)| b).map_err(errors::body_rejection)
}

/// Runs a pipeline and answers with its run summary. `count` decides how
/// many of the produced records the caller is told about.
pub async fn submit<Req, T, F>(
    services: Arc<AppServices>,
    req: Req,
    count: fn(&[T]) -> usize,
    run: F,
) -> axum::response::Response
where
    Req: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&AnalyticsPipelines, Req) -> Result<PipelineRun<T>, PipelineError> + Send + 'static,
{
    match services::blocking(services, move |p| run(p, req)).await {
        Ok(pipeline_run) => {
            let n = count(&pipeline_run.result.records);
            (StatusCode::OK, Json(dto::run_summary(&pipeline_run, n))).into_response()
        }
        Err(resp) => resp,
    }
}

pub fn all<T>(records: &[T]) -> usize {
    records.len()
}

/// Answers a read-back with a bare JSON array.
pub async fn read_back<T, F>(services: Arc<AppServices>, read: F) -> axum::response::Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&AnalyticsPipelines) -> Result<Vec<Stored<T>>, PipelineError> + Send + 'static,
{
    match services::blocking(services, read).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(resp) => resp,
    }
}

pub fn path_warehouse(company_id: i64, warehouse_id: i64) -> Result<(CompanyId, WarehouseId), axum::response::Response> {
    let scope = Scope::warehouse(Some(company_id), Some(warehouse_id)).map_err(errors::scope_error)?;
    let warehouse = scope.require_warehouse().map_err(errors::scope_error)?;
    Ok((scope.company_id(), warehouse))
}

pub fn path_company(company_id: i64) -> Result<CompanyId, axum::response::Response> {
    Scope::company(Some(company_id))
        .map(|s| s.company_id())
        .map_err(errors::scope_error)
}
