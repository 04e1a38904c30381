use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{
    CompanyId, EntityKey, Granularity, ModelVersion, NaturalKeyed, ProductId, TimeSeriesPoint, WarehouseId,
};

use crate::forecast::manager::{CacheOutcome, ForecastModelManager};
use crate::forecast::store::{ForecastTarget, ModelKey};
use crate::job::AiJob;
use crate::result::{AiError, AiResult};

/// One forecast day for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub forecast_date: NaiveDate,
    pub predicted_quantity: f64,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for ForecastPoint {
    type Key = (CompanyId, ProductId, WarehouseId, NaiveDate, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.company_id,
            self.product_id,
            self.warehouse_id,
            self.forecast_date,
            self.model_version.clone(),
        )
    }
}

/// Daily quantity series per SKU for one warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastInput {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub series: BTreeMap<ProductId, Vec<TimeSeriesPoint>>,
    /// "Today" for stale-series handling.
    pub as_of: NaiveDate,
}

/// Demand forecast for every SKU in a warehouse.
///
/// SKUs with too little history are skipped; the batch never fails because
/// one SKU cannot be forecast.
pub struct DemandForecastJob {
    input: ForecastInput,
    manager: Arc<ForecastModelManager>,
    horizon_days: usize,
    model_version: ModelVersion,
}

impl DemandForecastJob {
    pub fn new(input: ForecastInput, manager: Arc<ForecastModelManager>) -> Self {
        Self {
            input,
            manager,
            horizon_days: 30,
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_horizon_days(mut self, horizon_days: usize) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }
}

impl AiJob for DemandForecastJob {
    type Input = ForecastInput;
    type Output = ForecastPoint;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<ForecastPoint>, AiError> {
        if self.horizon_days == 0 {
            return Err(AiError::InvalidInput("horizon_days must be positive".to_string()));
        }

        let mut records = Vec::new();
        let (mut skipped, mut failed, mut trained, mut reused) = (0usize, 0usize, 0usize, 0usize);

        for (product, series) in &self.input.series {
            let key = ModelKey::new(
                ForecastTarget::Demand,
                EntityKey::product(self.input.company_id, self.input.warehouse_id, *product),
            );
            let forecast = match self.manager.forecast(
                &key,
                series,
                Granularity::Day,
                self.horizon_days,
                self.input.as_of,
            ) {
                Ok(Some(f)) => f,
                Ok(None) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "forecast failed for sku; skipping");
                    failed += 1;
                    continue;
                }
            };

            match forecast.cache {
                CacheOutcome::Reused => reused += 1,
                CacheOutcome::Trained | CacheOutcome::Retrained => trained += 1,
            }

            records.extend(forecast.points.into_iter().map(|p| ForecastPoint {
                company_id: self.input.company_id,
                warehouse_id: self.input.warehouse_id,
                product_id: *product,
                forecast_date: p.date,
                predicted_quantity: p.value,
                model_version: self.model_version.clone(),
            }));
        }

        let metadata = json!({
            "kind": "forecast.demand",
            "products": self.input.series.len(),
            "skipped": skipped,
            "failed": failed,
            "trained": trained,
            "reused": reused,
            "horizon_days": self.horizon_days,
        });

        if records.is_empty() {
            return Ok(AiResult::insufficient("No trainable SKUs found (insufficient history).")
                .with_metadata(metadata));
        }

        Ok(AiResult::new(records)
            .with_explanation(format!(
                "forecast {} day(s) for {} sku(s)",
                self.horizon_days,
                trained + reused
            ))
            .with_metadata(metadata))
    }
}
