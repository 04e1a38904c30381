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
        .route("/customers/segments", post(segment_customers))
        .route("/customers/segments/:company_id", get(list_segments))
}

pub async fn segment_customers(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SegmentsBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match common::body(body).and_then(dto::SegmentsBody::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    common::submit(services, req, common::all, |p, req| p.segment_customers(req)).await
}

pub async fn list_segments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(company_id): Path<i64>,
) -> axum::response::Response {
    let company = match common::path_company(company_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    common::read_back(services, move |p| p.customer_segments(company)).await
}
