//! Infrastructure layer: configuration, model and record storage, the ledger
//! source, and the pipeline service that ties them to the engine.

pub mod config;
pub mod ledger_source;
pub mod model_store;
pub mod pipelines;
pub mod records;

pub use config::{ConfigError, EngineConfig};
pub use ledger_source::{LedgerSource, LedgerSourceError};
pub use model_store::FileModelStore;
pub use pipelines::{
    AnalyticsPipelines, AnomalyRequest, ForecastRequest, InventoryRequest, PeriodRequest, PipelineError,
    PipelineRun, RecordStores, ScopedRequest, SegmentationRequest,
};
pub use records::{InMemoryRecordStore, PersistError, RecordStore, Stored};
