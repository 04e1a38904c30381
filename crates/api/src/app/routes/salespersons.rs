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
        .route("/salespersons/score", post(score_salespersons))
        .route("/salespersons/score/:company_id/:warehouse_id", get(list_salesperson_scores))
}

pub async fn score_salespersons(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SalespersonScoreBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::SalespersonScoreBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, common::all, |p, req| p.score_salespersons(req)).await
}

pub async fn list_salesperson_scores(
    Extension(services): Extension<Arc<AppServices>>,
    Path((company_id, warehouse_id)): Path<(i64, i64)>,
) -> axum::response::Response {
    let (company, warehouse) = match common::path_warehouse(company_id, warehouse_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.salesperson_scores(company, warehouse)).await
}
