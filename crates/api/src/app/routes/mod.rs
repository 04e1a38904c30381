use axum::{routing::get, Router};

pub mod anomaly;
pub mod common;
pub mod customers;
pub mod finance;
pub mod forecast;
pub mod inventory;
pub mod ledger;
pub mod pricing;
pub mod salespersons;
pub mod suppliers;
pub mod system;

/// Router for every `/api/v1` endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .merge(forecast::router())
        .merge(anomaly::router())
        .merge(inventory::router())
        .merge(pricing::router())
        .merge(customers::router())
        .merge(suppliers::router())
        .merge(salespersons::router())
        .merge(finance::router())
        .merge(ledger::router())
}
