//! Forecast Model Manager: train-or-reuse per key, then predict forward.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use insight_core::{Granularity, TimeSeriesPoint};

use crate::forecast::model::{ForecastParams, TrendSeasonalModel};
use crate::forecast::store::{CachedModel, ModelKey, ModelStore};
use crate::result::AiError;

/// How the model used for a forecast was obtained.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    /// A valid cached model was reused.
    Reused,
    /// No cached model existed; a new one was trained.
    Trained,
    /// A cached model existed but was unusable (corrupt, schema or parameter
    /// mismatch); it was replaced by a fresh one.
    Retrained,
}

/// Forward forecast for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    pub key: ModelKey,
    pub points: Vec<TimeSeriesPoint>,
    pub cache: CacheOutcome,
}

/// Owns the per-key model cache.
///
/// Load/train/save for one key is serialized inside a process by a keyed
/// mutex. Across processes sharing a store there is no exclusivity: two
/// writers may both train and the later save wins.
pub struct ForecastModelManager {
    store: Arc<dyn ModelStore>,
    params: ForecastParams,
    locks: Mutex<HashMap<ModelKey, Arc<Mutex<()>>>>,
}

impl ForecastModelManager {
    pub fn new(store: Arc<dyn ModelStore>, params: ForecastParams) -> Self {
        Self {
            store,
            params,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &ForecastParams {
        &self.params
    }

    /// Drop the cached model for `key`; the next forecast retrains.
    pub fn invalidate(&self, key: &ModelKey) -> Result<(), AiError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store
            .invalidate(key)
            .map_err(|e| AiError::Internal(e.to_string()))
    }

    /// Forecast `horizon` buckets for `key`.
    ///
    /// Returns `Ok(None)` when the series is shorter than the target's
    /// minimum (see [`crate::forecast::ForecastTarget::min_points`]); the
    /// caller treats that key as skipped. Predictions are raw model output
    /// and may be negative.
    pub fn forecast(
        &self,
        key: &ModelKey,
        series: &[TimeSeriesPoint],
        granularity: Granularity,
        horizon: usize,
        as_of: NaiveDate,
    ) -> Result<Option<ModelForecast>, AiError> {
        let params = self.params_for(key);
        if series.len() < params.min_points {
            tracing::debug!(key = %key, points = series.len(), "series too short; skipping");
            return Ok(None);
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let (model, cache) = self.load_or_train(key, series, granularity, &params)?;
        let points = predict_forward(&model, horizon, as_of)?;

        Ok(Some(ModelForecast {
            key: *key,
            points,
            cache,
        }))
    }

    fn load_or_train(
        &self,
        key: &ModelKey,
        series: &[TimeSeriesPoint],
        granularity: Granularity,
        params: &ForecastParams,
    ) -> Result<(TrendSeasonalModel, CacheOutcome), AiError> {
        let outcome = match self.store.load(key) {
            Ok(Some(cached)) => {
                if cached.key == *key
                    && cached.params == *params
                    && cached.model.granularity == granularity
                {
                    tracing::info!(key = %key, trained_at = %cached.trained_at, "reusing cached model");
                    return Ok((cached.model, CacheOutcome::Reused));
                }
                tracing::warn!(key = %key, "cached model does not match request; retraining");
                CacheOutcome::Retrained
            }
            Ok(None) => CacheOutcome::Trained,
            Err(e) if e.is_corruption() => {
                tracing::warn!(key = %key, error = %e, "cached model unusable; retraining");
                if let Err(e) = self.store.invalidate(key) {
                    tracing::warn!(key = %key, error = %e, "failed to drop corrupt model");
                }
                CacheOutcome::Retrained
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "model store load failed; training without cache");
                CacheOutcome::Trained
            }
        };

        let model = TrendSeasonalModel::fit(series, granularity, params)
            .map_err(|e| AiError::InferenceFailed(format!("{key}: {e}")))?;

        let artifact = CachedModel::new(*key, *params, model.clone());
        match self.store.save(&artifact) {
            Ok(()) => tracing::info!(key = %key, points = series.len(), ?outcome, "trained and saved model"),
            Err(e) => tracing::warn!(key = %key, error = %e, "trained model could not be saved"),
        }

        Ok((model, outcome))
    }

    fn params_for(&self, key: &ModelKey) -> ForecastParams {
        ForecastParams {
            min_points: key.target.min_points(self.params.min_points),
            ..self.params
        }
    }

    fn key_lock(&self, key: &ModelKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(*key).or_default().clone()
    }
}

/// `horizon` ascending buckets starting after the model's last observation,
/// or at `as_of` when the model was trained on stale data.
fn predict_forward(
    model: &TrendSeasonalModel,
    horizon: usize,
    as_of: NaiveDate,
) -> Result<Vec<TimeSeriesPoint>, AiError> {
    let g = model.granularity;
    let after_last = g
        .next(model.last_bucket)
        .ok_or_else(|| AiError::InferenceFailed("forecast start out of date range".to_string()))?;
    let mut date = after_last.max(g.bucket(as_of));

    let mut points = Vec::with_capacity(horizon);
    for i in 0..horizon {
        points.push(TimeSeriesPoint::new(date, model.predict(date)));
        if i + 1 < horizon {
            date = g
                .next(date)
                .ok_or_else(|| AiError::InferenceFailed("forecast horizon out of date range".to_string()))?;
        }
    }
    Ok(points)
}
