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
        .route("/suppliers/score", post(score_suppliers))
        .route("/suppliers/score/:company_id", get(list_supplier_scores))
}

pub async fn score_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SupplierScoreBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::SupplierScoreBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, common::all, |p, req| p.score_suppliers(req)).await
}

pub async fn list_supplier_scores(
    Extension(services): Extension<Arc<AppServices>>,
    Path(company_id): Path<i64>,
) -> axum::response::Response {
    let company = match common::path_company(company_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.supplier_scores(company)).await
}
