//! `insight-core`: primitives shared by every layer of the engine.
//!
//! This crate contains **pure** building blocks (no IO, no storage):
//! identifiers, scope validation, entity keys, time-series points and the
//! natural-key contract used by the record stores.

pub mod entity;
pub mod error;
pub mod id;
pub mod scope;
pub mod series;
pub mod version;

pub use entity::NaturalKeyed;
pub use error::{DomainError, DomainResult};
pub use id::{
    CompanyId, CustomerId, ProductId, PurchaseId, SaleId, SalespersonId, SupplierId, WarehouseId,
};
pub use scope::{EntityKey, Scope};
pub use series::{Granularity, TimeSeriesPoint};
pub use version::ModelVersion;
