//! `insight-ai`
//!
//! **Responsibility:** the forecasting-and-decision engine.
//!
//! This crate is intentionally **storage-agnostic**:
//! - It does not read the source ledgers; callers hand in aggregated series.
//! - It does not persist results; jobs return natural-keyed records.
//! - The only state it owns is the forecast model cache, behind [`forecast::ModelStore`].

pub mod anomaly;
pub mod finance;
pub mod forecast;
pub mod inventory;
pub mod job;
pub mod pricing;
pub mod result;
pub mod scheduler;
pub mod scoring;
pub mod segmentation;
pub mod stats;

pub use job::AiJob;
pub use result::{AiError, AiResult};
pub use scheduler::{AiScheduler, CompanyScope, LocalAiScheduler};
