//! Per-entity time-series forecasting with a persistent model cache.

pub mod job;
pub mod manager;
pub mod model;
pub mod store;

pub use job::{DemandForecastJob, ForecastInput, ForecastPoint};
pub use manager::{CacheOutcome, ForecastModelManager, ModelForecast};
pub use model::{ForecastParams, ModelError, TrendSeasonalModel};
pub use store::{
    CachedModel, ForecastTarget, InMemoryModelStore, MODEL_SCHEMA_VERSION, ModelKey, ModelStore,
    ModelStoreError,
};
