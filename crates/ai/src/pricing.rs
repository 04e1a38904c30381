//! Price elasticity estimation and bounded price suggestions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{
    CompanyId, EntityKey, Granularity, ModelVersion, NaturalKeyed, ProductId, TimeSeriesPoint, WarehouseId,
};

use crate::forecast::{ForecastModelManager, ForecastTarget, ModelKey};
use crate::job::AiJob;
use crate::result::{AiError, AiResult};
use crate::stats::{mean, round2, safe_pct_change};

/// Elasticity assumed when it cannot be estimated.
pub const DEFAULT_ELASTICITY: f64 = -1.0;

const RECENT_WINDOW: usize = 7;
const FORECAST_WINDOW_DAYS: u32 = 30;

/// One day of sales for a product: average realized price and total quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: f64,
}

/// Log-log slope of quantity on price (covariance over variance of log price).
///
/// Only points with positive price and quantity are used. Falls back to
/// [`DEFAULT_ELASTICITY`] with fewer than two usable points or no price spread.
pub fn estimate_elasticity(observations: &[PriceObservation]) -> f64 {
    let logs: Vec<(f64, f64)> = observations
        .iter()
        .filter(|o| o.price > 0.0 && o.quantity > 0.0)
        .map(|o| (o.price.ln(), o.quantity.ln()))
        .collect();
    if logs.len() < 2 {
        return DEFAULT_ELASTICITY;
    }

    let n = logs.len() as f64;
    let mp = logs.iter().map(|(p, _)| p).sum::<f64>() / n;
    let mq = logs.iter().map(|(_, q)| q).sum::<f64>() / n;
    let var = logs.iter().map(|(p, _)| (p - mp) * (p - mp)).sum::<f64>() / n;
    if var.sqrt() <= f64::EPSILON {
        return DEFAULT_ELASTICITY;
    }
    let cov = logs.iter().map(|(p, q)| (p - mp) * (q - mq)).sum::<f64>() / n;
    cov / var
}

/// Unrounded outcome of the pricing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSuggestion {
    pub floor_price: f64,
    pub suggested_price: f64,
    pub price_change_pct: f64,
    pub expected_demand_change: f64,
    pub rationale: String,
}

/// Apply the pricing rule.
///
/// `avg_cost` may be 0 when unknown, which disables the floor.
pub fn suggest_price(
    current_price: f64,
    avg_cost: f64,
    elasticity: f64,
    forecast_demand: f64,
    recent_demand: f64,
) -> PriceSuggestion {
    let floor_price = (avg_cost * 1.20).max(avg_cost * 1.05);
    let elasticity_factor = 1.0 + (-0.1 * elasticity).clamp(-0.3, 0.3);
    let divergence = (forecast_demand - recent_demand) / (recent_demand + 1e-6);
    let demand_factor = 1.0 + (divergence * 0.05).clamp(-0.1, 0.1);

    let suggested_price = floor_price.max(current_price * elasticity_factor * demand_factor);
    let price_change_pct = safe_pct_change(suggested_price, current_price);

    let mut signals = Vec::new();
    if avg_cost > 0.0 {
        signals.push("Cost floor");
    }
    if elasticity < -0.8 {
        signals.push("High elasticity");
    } else if elasticity > -0.2 {
        signals.push("Low elasticity");
    }
    if forecast_demand > recent_demand * 1.1 {
        signals.push("Rising demand");
    } else if forecast_demand < recent_demand * 0.9 {
        signals.push("Weak demand");
    }
    let rationale = if signals.is_empty() {
        "Balanced factors".to_string()
    } else {
        signals.join(", ")
    };

    PriceSuggestion {
        floor_price,
        suggested_price,
        price_change_pct,
        expected_demand_change: -elasticity * price_change_pct,
        rationale,
    }
}

/// Confidence grows with the number of observations, within [30, 95].
pub fn confidence_level(observations: usize) -> f64 {
    (30.0 + 2.0 * observations as f64).clamp(30.0, 95.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecommendation {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub current_price: f64,
    pub suggested_price: f64,
    pub floor_price: f64,
    pub price_change_pct: f64,
    pub expected_demand_change: f64,
    pub elasticity: f64,
    pub confidence_level: f64,
    pub rationale: String,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for PricingRecommendation {
    type Key = (CompanyId, WarehouseId, ProductId, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.company_id,
            self.warehouse_id,
            self.product_id,
            self.model_version.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductPricing {
    /// Ascending by date.
    pub history: Vec<PriceObservation>,
    /// Average purchase unit cost; 0 when unknown.
    pub avg_cost: f64,
    /// Daily settled quantity, the series the product's demand model is fit on.
    pub demand: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingInput {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub products: BTreeMap<ProductId, ProductPricing>,
    pub as_of: NaiveDate,
}

pub struct PricingJob {
    input: PricingInput,
    manager: Arc<ForecastModelManager>,
    model_version: ModelVersion,
}

impl PricingJob {
    pub fn new(input: PricingInput, manager: Arc<ForecastModelManager>) -> Self {
        Self {
            input,
            manager,
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }

    /// Mean predicted daily quantity over the next 30 days, if a forecast
    /// can be produced from the product's demand series.
    fn forecast_demand(&self, product: ProductId, series: &[TimeSeriesPoint]) -> Option<f64> {
        let key = ModelKey::new(
            ForecastTarget::Demand,
            EntityKey::product(self.input.company_id, self.input.warehouse_id, product),
        );
        let end = self.input.as_of + Duration::days(i64::from(FORECAST_WINDOW_DAYS));

        match self.manager.forecast(
            &key,
            series,
            Granularity::Day,
            FORECAST_WINDOW_DAYS as usize,
            self.input.as_of,
        ) {
            Ok(Some(f)) => {
                let window: Vec<f64> = f
                    .points
                    .iter()
                    .filter(|p| p.date >= self.input.as_of && p.date < end)
                    .map(|p| p.value)
                    .collect();
                (!window.is_empty()).then(|| mean(&window))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "pricing demand forecast failed");
                None
            }
        }
    }
}

impl AiJob for PricingJob {
    type Input = PricingInput;
    type Output = PricingRecommendation;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<PricingRecommendation>, AiError> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (product, p) in &self.input.products {
            let usable: Vec<PriceObservation> = p
                .history
                .iter()
                .filter(|o| o.price > 0.0 && o.quantity > 0.0)
                .copied()
                .collect();
            let Some(last) = usable.last() else {
                skipped += 1;
                continue;
            };

            let current_price = last.price;
            let tail = &usable[usable.len().saturating_sub(RECENT_WINDOW)..];
            let recent = mean(&tail.iter().map(|o| o.quantity).collect::<Vec<_>>());
            let forecast = self.forecast_demand(*product, &p.demand).unwrap_or(recent);
            let elasticity = estimate_elasticity(&usable);
            let cost = if p.avg_cost.is_finite() { p.avg_cost.max(0.0) } else { 0.0 };

            let s = suggest_price(current_price, cost, elasticity, forecast, recent);
            records.push(PricingRecommendation {
                company_id: self.input.company_id,
                warehouse_id: self.input.warehouse_id,
                product_id: *product,
                current_price: round2(current_price),
                suggested_price: round2(s.suggested_price),
                floor_price: round2(s.floor_price),
                price_change_pct: round2(s.price_change_pct),
                expected_demand_change: round2(s.expected_demand_change),
                elasticity: round2(elasticity),
                confidence_level: round2(confidence_level(usable.len())),
                rationale: s.rationale,
                model_version: self.model_version.clone(),
            });
        }

        let metadata = json!({
            "kind": "pricing.recommend",
            "products": self.input.products.len(),
            "skipped": skipped,
        });

        if records.is_empty() {
            return Ok(AiResult::insufficient("No sales history found for pricing.").with_metadata(metadata));
        }

        let explanation = format!("{} price recommendation(s)", records.len());
        Ok(AiResult::new(records)
            .with_explanation(explanation)
            .with_metadata(metadata))
    }
}
