//! HTTP API: routing and request/response mapping over the analytics pipelines.

pub mod app;
