use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    routing::{get, post},
    Json, Router,
};

use crate::app::dto;
use crate::app::routes::common;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/profitability/forecast", post(forecast_profitability))
        .route("/profitability/forecast/:company_id/:warehouse_id", get(list_profitability))
        .route("/cashflow/forecast", post(forecast_cashflow))
        .route("/cashflow/forecast/:company_id/:warehouse_id", get(list_cashflow))
}

pub async fn forecast_profitability(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ScopedBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::ScopedBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, common::all, |p, req| p.profitability(req)).await
}

pub async fn list_profitability(
    Extension(services): Extension<Arc<AppServices>>,
    Path((company_id, warehouse_id)): Path<(i64, i64)>,
) -> axum::response::Response {
    let (company, warehouse) = match common::path_warehouse(company_id, warehouse_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.profitability_records(company, warehouse)).await
}

pub async fn forecast_cashflow(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ScopedBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::ScopedBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, common::all, |p, req| p.cashflow(req)).await
}

pub async fn list_cashflow(
    Extension(services): Extension<Arc<AppServices>>,
    Path((company_id, warehouse_id)): Path<(i64, i64)>,
) -> axum::response::Response {
    let (company, warehouse) = match common::path_warehouse(company_id, warehouse_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.cashflow_records(company, warehouse)).await
}
