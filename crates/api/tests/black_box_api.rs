use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use insight_infra::EngineConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, default config, bound to an ephemeral port.
        let services = insight_api::app::services::build_services(EngineConfig::default())
            .expect("failed to build services");
        let app = insight_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api/v1", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
}

/// 90 days of 10 units/day of product 100 in warehouse 5, plus 50 units received.
fn constant_demand_ledger() -> Value {
    let sales: Vec<Value> = (1..=90)
        .map(|i| {
            json!({
                "sale_id": i,
                "company_id": 1,
                "warehouse_id": 5,
                "customer_id": 100 + i % 5,
                "product_id": 100,
                "date": (as_of() - Duration::days(i)).to_string(),
                "status": "PAID",
                "quantity": 10.0,
                "unit_price": 5.0,
            })
        })
        .collect();

    json!({
        "sales": sales,
        "movements": [{
            "company_id": 1,
            "warehouse_id": 5,
            "product_id": 100,
            "date": "2024-01-01",
            "kind": "RECEIPT_IN",
            "approved": true,
            "quantity": 50.0,
        }],
    })
}

async fn load_ledger(client: &reqwest::Client, srv: &TestServer) {
    let res = client
        .put(srv.url("/ledger"))
        .json(&constant_demand_ledger())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["sales"], 90);
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_scope_is_rejected_before_running() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/forecast"))
        .json(&json!({ "company_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "missing_scope");

    let res = client
        .post(srv.url("/reorders"))
        .json(&json!({ "company_id": 1, "warehouse_id": -2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn malformed_bodies_and_missing_parameters_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/anomaly/sales"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = client
        .post(srv.url("/customers/segments"))
        .json(&json!({ "company_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/customers/segments"))
        .json(&json!({ "company_id": 1, "customer_column": "client_ref" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/suppliers/score"))
        .json(&json!({ "company_id": 1, "period_start": "2024-01-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/salespersons/score"))
        .json(&json!({ "company_id": 1, "start_date": "2024-03-01", "end_date": "2024-01-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_ledger_answers_ok_with_zero_count() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/forecast"))
        .json(&json!({ "company_id": 1, "warehouse_id": 5, "as_of": "2024-04-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["count"], 0);
    assert!(body["message"].is_string());

    let res = reqwest::get(srv.url("/forecast/1/5")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rows: Vec<Value> = res.json().await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn forecast_is_persisted_and_read_back_in_date_order() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    load_ledger(&client, &srv).await;

    let res = client
        .post(srv.url("/forecast"))
        .json(&json!({
            "company_id": 1,
            "warehouse_id": 5,
            "product_id": 100,
            "days": 5,
            "as_of": "2024-04-01",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 5);

    let rows: Vec<Value> = reqwest::get(srv.url("/forecast/1/5")).await.unwrap().json().await.unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["forecast_date"], "2024-04-01");
    let dates: Vec<&str> = rows.iter().map(|r| r["forecast_date"].as_str().unwrap()).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    assert!(rows.iter().all(|r| r["generated_at"].is_string()));

    // Another company sees nothing.
    let rows: Vec<Value> = reqwest::get(srv.url("/forecast/2/5")).await.unwrap().json().await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn reorders_count_only_products_that_need_stock() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    load_ledger(&client, &srv).await;

    let res = client
        .post(srv.url("/reorders"))
        .json(&json!({
            "company_id": 1,
            "warehouse_id": 5,
            "lead_time_days": 7.0,
            "service_level_z": 1.65,
            "as_of": "2024-04-01",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 1);

    let rows: Vec<Value> = reqwest::get(srv.url("/reorders/1/5")).await.unwrap().json().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["product_id"], 100);
    let qty = rows[0]["suggested_reorder_qty"].as_f64().unwrap();
    assert!((qty - 20.0).abs() < 0.01);
}

#[tokio::test]
async fn invalid_read_back_path_is_rejected() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/reorders/0/5")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
