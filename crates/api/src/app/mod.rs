//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the pipeline service shared by all handlers
//! - `routes/`: HTTP routes + handlers (one file per analytics area)
//! - `dto.rs`: request bodies, their validation, and run summaries
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .nest("/api/v1", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
