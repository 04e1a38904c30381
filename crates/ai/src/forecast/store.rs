//! Model cache storage.
//!
//! Stores hold serialized [`CachedModel`] artifacts keyed by [`ModelKey`]. The
//! manager owns the read-modify-write cycle; stores only load and save bytes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use insight_core::EntityKey;

use crate::forecast::model::{ForecastParams, TrendSeasonalModel};

/// Bumped whenever the artifact layout changes; older artifacts are retrained.
pub const MODEL_SCHEMA_VERSION: u32 = 1;

/// What a cached model forecasts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastTarget {
    Demand,
    NetProfit,
    CashBalance,
}

impl ForecastTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastTarget::Demand => "demand",
            ForecastTarget::NetProfit => "net_profit",
            ForecastTarget::CashBalance => "cash_balance",
        }
    }

    /// Fewest points a model for this target is fit from, given the
    /// configured minimum.
    pub fn min_points(&self, configured: usize) -> usize {
        match self {
            // Monthly balances are fit from two months.
            ForecastTarget::CashBalance => configured.min(2),
            ForecastTarget::Demand | ForecastTarget::NetProfit => configured,
        }
    }
}

/// Cache key: one model per (target, entity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub target: ForecastTarget,
    pub entity: EntityKey,
}

impl ModelKey {
    pub fn new(target: ForecastTarget, entity: EntityKey) -> Self {
        Self { target, entity }
    }

    /// Filesystem-safe name, unique per key.
    pub fn storage_name(&self) -> String {
        format!("{}_{}", self.target.as_str(), self.entity.storage_name())
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target.as_str(), self.entity)
    }
}

/// Persisted model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedModel {
    pub schema_version: u32,
    pub key: ModelKey,
    pub params: ForecastParams,
    pub model: TrendSeasonalModel,
    pub trained_at: DateTime<Utc>,
}

impl CachedModel {
    pub fn new(key: ModelKey, params: ForecastParams, model: TrendSeasonalModel) -> Self {
        Self {
            schema_version: MODEL_SCHEMA_VERSION,
            key,
            params,
            model,
            trained_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelStoreError> {
        serde_json::to_vec(self).map_err(|e| ModelStoreError::Corrupt(e.to_string()))
    }

    /// Decode an artifact, checking the schema version before the body.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelStoreError> {
        let raw: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ModelStoreError::Corrupt(e.to_string()))?;
        let found = raw
            .get("schema_version")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ModelStoreError::Corrupt("missing schema_version".to_string()))?;
        if found != u64::from(MODEL_SCHEMA_VERSION) {
            return Err(ModelStoreError::SchemaMismatch {
                found,
                expected: MODEL_SCHEMA_VERSION,
            });
        }
        serde_json::from_value(raw).map_err(|e| ModelStoreError::Corrupt(e.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelStoreError {
    #[error("cached model is corrupt: {0}")]
    Corrupt(String),

    #[error("cached model schema {found} does not match expected {expected}")]
    SchemaMismatch { found: u64, expected: u32 },

    #[error("model store io error: {0}")]
    Io(String),

    #[error("model store unavailable: {0}")]
    Unavailable(String),
}

impl ModelStoreError {
    /// The artifact exists but cannot be used; retraining replaces it.
    pub fn is_corruption(&self) -> bool {
        matches!(self, ModelStoreError::Corrupt(_) | ModelStoreError::SchemaMismatch { .. })
    }
}

/// Pluggable model cache storage.
///
/// Writes are not atomic with respect to other processes; concurrent writers
/// for the same key resolve as last-writer-wins.
pub trait ModelStore: Send + Sync {
    fn load(&self, key: &ModelKey) -> Result<Option<CachedModel>, ModelStoreError>;
    fn save(&self, model: &CachedModel) -> Result<(), ModelStoreError>;
    fn invalidate(&self, key: &ModelKey) -> Result<(), ModelStoreError>;
}

impl<S> ModelStore for Arc<S>
where
    S: ModelStore + ?Sized,
{
    fn load(&self, key: &ModelKey) -> Result<Option<CachedModel>, ModelStoreError> {
        (**self).load(key)
    }

    fn save(&self, model: &CachedModel) -> Result<(), ModelStoreError> {
        (**self).save(model)
    }

    fn invalidate(&self, key: &ModelKey) -> Result<(), ModelStoreError> {
        (**self).invalidate(key)
    }
}

/// In-process model store holding serialized artifacts.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    inner: RwLock<HashMap<ModelKey, Vec<u8>>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under `key` without validation.
    pub fn insert_raw(&self, key: ModelKey, bytes: Vec<u8>) -> Result<(), ModelStoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.insert(key, bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelStore for InMemoryModelStore {
    fn load(&self, key: &ModelKey) -> Result<Option<CachedModel>, ModelStoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        match map.get(key) {
            Some(bytes) => CachedModel::from_bytes(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, model: &CachedModel) -> Result<(), ModelStoreError> {
        let bytes = model.to_bytes()?;
        let mut map = self.inner.write().map_err(poisoned)?;
        map.insert(model.key, bytes);
        Ok(())
    }

    fn invalidate(&self, key: &ModelKey) -> Result<(), ModelStoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.remove(key);
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ModelStoreError {
    ModelStoreError::Unavailable("model store lock poisoned".to_string())
}
