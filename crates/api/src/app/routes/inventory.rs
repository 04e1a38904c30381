use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    routing::{get, post},
    Json, Router,
};

use insight_ai::inventory::InventoryDecision;

use crate::app::dto;
use crate::app::routes::common;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/reorders", post(run_reorders))
        .route("/reorders/:company_id/:warehouse_id", get(list_reorders))
        .route("/inventory/optimize", post(run_optimize))
        .route("/inventory/optimize/:company_id/:warehouse_id", get(list_decisions))
}

fn reorder_count(decisions: &[InventoryDecision]) -> usize {
    decisions.iter().filter(|d| d.suggested_reorder_qty > 0.0).count()
}

/// Same pipeline as `/inventory/optimize`; only reorder candidates are counted.
pub async fn run_reorders(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::InventoryBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::InventoryBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, reorder_count, |p, req| p.inventory(req)).await
}

pub async fn run_optimize(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::InventoryBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::InventoryBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, common::all, |p, req| p.inventory(req)).await
}

pub async fn list_reorders(
    Extension(services): Extension<Arc<AppServices>>,
    Path((company_id, warehouse_id)): Path<(i64, i64)>,
) -> axum::response::Response {
    let (company, warehouse) = match common::path_warehouse(company_id, warehouse_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.reorders(company, warehouse)).await
}

pub async fn list_decisions(
    Extension(services): Extension<Arc<AppServices>>,
    Path((company_id, warehouse_id)): Path<(i64, i64)>,
) -> axum::response::Response {
    let (company, warehouse) = match common::path_warehouse(company_id, warehouse_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.inventory_decisions(company, warehouse)).await
}
