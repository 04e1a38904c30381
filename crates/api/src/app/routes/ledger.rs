use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::put,
    Json, Router,
};

use insight_ledger::LedgerSnapshot;

use crate::app::routes::common;
use crate::app::services::{self, AppServices};

pub fn router() -> Router {
    Router::new().route("/ledger", put(replace_ledger))
}

/// Swaps in a new ledger snapshot; later pipeline runs read from it.
pub async fn replace_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LedgerSnapshot>, JsonRejection>,
) -> axum::response::Response {
    let snapshot = match common::body(body) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let counts = serde_json::json!({
        "status": "success",
        "sales": snapshot.sales.len(),
        "purchases": snapshot.purchases.len(),
        "expenses": snapshot.expenses.len(),
        "payments": snapshot.payments.len(),
        "movements": snapshot.movements.len(),
    });

    match services::blocking(services, move |p| p.replace_ledger(snapshot)).await {
        Ok(()) => (StatusCode::OK, Json(counts)).into_response(),
        Err(resp) => resp,
    }
}
