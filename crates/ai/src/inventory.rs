//! Inventory decision engine: safety stock, reorder point, optimal level and
//! stock health per SKU.
//!
//! Demand statistics come from the near-term demand forecast when one can be
//! produced, otherwise from realized daily sales over a lookback window,
//! otherwise zero. The chosen source is reported on every decision.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{
    CompanyId, DomainError, DomainResult, EntityKey, Granularity, ModelVersion, NaturalKeyed, ProductId,
    TimeSeriesPoint, WarehouseId,
};

use crate::forecast::{ForecastModelManager, ForecastTarget, ModelKey};
use crate::job::AiJob;
use crate::result::{AiError, AiResult};
use crate::stats::{mean, round2, std_population};

/// Stock at or below this is treated as zero.
pub const STOCKOUT_EPSILON: f64 = 1e-4;

/// Which level marks stock as LOW.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowStockTrigger {
    /// Below the reorder point: replenishment is due.
    #[default]
    ReorderPoint,
    /// Below the safety stock only.
    SafetyStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryPolicy {
    pub lead_time_days: f64,
    pub service_level_z: f64,
    pub horizon_days: u32,
    /// Realized-sales window used when no forecast is available.
    pub lookback_days: u32,
    /// Stock above `optimal * overstock_multiplier` is OVERSTOCK.
    pub overstock_multiplier: f64,
    pub low_stock_trigger: LowStockTrigger,
}

impl Default for InventoryPolicy {
    fn default() -> Self {
        Self {
            lead_time_days: 7.0,
            service_level_z: 1.65,
            horizon_days: 30,
            lookback_days: 90,
            overstock_multiplier: 1.2,
            low_stock_trigger: LowStockTrigger::ReorderPoint,
        }
    }
}

impl InventoryPolicy {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.lead_time_days.is_finite() || self.lead_time_days < 0.0 {
            return Err(DomainError::validation("lead_time_days must be >= 0"));
        }
        if !self.service_level_z.is_finite() || self.service_level_z < 0.0 {
            return Err(DomainError::validation("service_level_z must be >= 0"));
        }
        if self.horizon_days == 0 {
            return Err(DomainError::validation("horizon_days must be positive"));
        }
        if self.lookback_days == 0 {
            return Err(DomainError::validation("lookback_days must be positive"));
        }
        if !self.overstock_multiplier.is_finite() || self.overstock_multiplier < 1.0 {
            return Err(DomainError::validation("overstock_multiplier must be >= 1"));
        }
        Ok(())
    }
}

/// Average and spread of daily demand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DemandStatistics {
    pub avg_daily_demand: f64,
    pub std_daily_demand: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandSource {
    Forecast,
    RecentSales,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDemand {
    pub source: DemandSource,
    pub stats: DemandStatistics,
}

/// Forecast first, realized sales second, zero otherwise. Never blended.
pub fn resolve_demand(forecast: Option<DemandStatistics>, recent: Option<DemandStatistics>) -> ResolvedDemand {
    match (forecast, recent) {
        (Some(stats), _) => ResolvedDemand {
            source: DemandSource::Forecast,
            stats,
        },
        (None, Some(stats)) => ResolvedDemand {
            source: DemandSource::RecentSales,
            stats,
        },
        (None, None) => ResolvedDemand {
            source: DemandSource::Default,
            stats: DemandStatistics::default(),
        },
    }
}

/// Statistics over predicted daily quantities; negatives count as zero.
pub fn forecast_statistics(predicted: &[f64]) -> Option<DemandStatistics> {
    if predicted.is_empty() {
        return None;
    }
    let clamped: Vec<f64> = predicted.iter().map(|q| q.max(0.0)).collect();
    Some(DemandStatistics {
        avg_daily_demand: mean(&clamped),
        std_daily_demand: std_population(&clamped),
    })
}

/// Statistics over the observed daily sales in the series. Days without
/// sales are absent from the series and do not count.
pub fn recent_statistics(daily: &[TimeSeriesPoint]) -> Option<DemandStatistics> {
    if daily.is_empty() {
        return None;
    }
    let values: Vec<f64> = daily.iter().map(|p| p.value).collect();
    Some(DemandStatistics {
        avg_daily_demand: mean(&values),
        std_daily_demand: std_population(&values),
    })
}

pub fn safety_stock(service_level_z: f64, std_daily_demand: f64, lead_time_days: f64) -> f64 {
    (service_level_z * std_daily_demand * lead_time_days.max(0.0).sqrt()).max(0.0)
}

pub fn reorder_point(avg_daily_demand: f64, lead_time_days: f64, safety_stock: f64) -> f64 {
    (avg_daily_demand * lead_time_days + safety_stock).max(0.0)
}

pub fn optimal_stock_level(avg_daily_demand: f64, horizon_days: f64, safety_stock: f64) -> f64 {
    (avg_daily_demand * horizon_days + safety_stock).max(0.0)
}

pub fn suggested_reorder_qty(reorder_point: f64, current_stock: f64) -> f64 {
    (reorder_point - current_stock).max(0.0)
}

/// 100 at the optimal level, falling linearly with relative distance from it.
pub fn inventory_health_score(current_stock: f64, optimal: f64) -> f64 {
    (100.0 * (1.0 - (current_stock - optimal).abs() / optimal.max(1.0))).clamp(0.0, 100.0)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Stockout,
    Low,
    Healthy,
    Overstock,
}

/// Classify stock against the computed levels, first match wins.
pub fn classify_stock(
    current: f64,
    safety_stock: f64,
    reorder_point: f64,
    optimal: f64,
    policy: &InventoryPolicy,
) -> StockStatus {
    let low_below = match policy.low_stock_trigger {
        LowStockTrigger::ReorderPoint => reorder_point,
        LowStockTrigger::SafetyStock => safety_stock,
    };
    if current <= STOCKOUT_EPSILON {
        StockStatus::Stockout
    } else if current < low_below {
        StockStatus::Low
    } else if current <= optimal * policy.overstock_multiplier {
        StockStatus::Healthy
    } else {
        StockStatus::Overstock
    }
}

/// Inventory recommendation for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryDecision {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub current_stock: f64,
    pub avg_daily_demand: f64,
    pub std_daily_demand: f64,
    pub demand_source: DemandSource,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub optimal_stock_level: f64,
    pub suggested_reorder_qty: f64,
    pub stock_status: StockStatus,
    pub inventory_health_score: f64,
    pub lead_time_days: f64,
    pub horizon_days: u32,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for InventoryDecision {
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

/// Pure decision for one SKU given its resolved demand.
pub fn decide(
    key: EntityKey,
    product_id: ProductId,
    current_stock: f64,
    demand: ResolvedDemand,
    policy: &InventoryPolicy,
    model_version: &ModelVersion,
) -> InventoryDecision {
    let DemandStatistics {
        avg_daily_demand: avg,
        std_daily_demand: std,
    } = demand.stats;

    let safety = safety_stock(policy.service_level_z, std, policy.lead_time_days);
    let reorder = reorder_point(avg, policy.lead_time_days, safety);
    let optimal = optimal_stock_level(avg, f64::from(policy.horizon_days), safety);
    let status = classify_stock(current_stock, safety, reorder, optimal, policy);

    InventoryDecision {
        company_id: key.company,
        warehouse_id: key.warehouse,
        product_id,
        current_stock: round2(current_stock),
        avg_daily_demand: round2(avg),
        std_daily_demand: round2(std),
        demand_source: demand.source,
        safety_stock: round2(safety),
        reorder_point: round2(reorder),
        optimal_stock_level: round2(optimal),
        suggested_reorder_qty: round2(suggested_reorder_qty(reorder, current_stock)),
        stock_status: status,
        inventory_health_score: round2(inventory_health_score(current_stock, optimal)),
        lead_time_days: policy.lead_time_days,
        horizon_days: policy.horizon_days,
        model_version: model_version.clone(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryInput {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    /// Stock on hand per product.
    pub stock: BTreeMap<ProductId, f64>,
    /// Daily committed-sales quantity per product, used for recent statistics.
    pub daily_demand: BTreeMap<ProductId, Vec<TimeSeriesPoint>>,
    /// Daily settled quantity per product, the series demand models are fit on.
    pub forecast_series: BTreeMap<ProductId, Vec<TimeSeriesPoint>>,
    pub as_of: NaiveDate,
}

/// Inventory decisions for every SKU that has stock or sales history.
pub struct InventoryOptimizationJob {
    input: InventoryInput,
    manager: Arc<ForecastModelManager>,
    policy: InventoryPolicy,
    model_version: ModelVersion,
}

impl InventoryOptimizationJob {
    pub fn new(input: InventoryInput, manager: Arc<ForecastModelManager>) -> Self {
        Self {
            input,
            manager,
            policy: InventoryPolicy::default(),
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_policy(mut self, policy: InventoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }

    fn forecast_demand(&self, key: EntityKey, series: &[TimeSeriesPoint]) -> Option<DemandStatistics> {
        let model_key = ModelKey::new(ForecastTarget::Demand, key);
        let horizon = self.policy.horizon_days as usize;
        let end = self.input.as_of + Duration::days(i64::from(self.policy.horizon_days));

        match self
            .manager
            .forecast(&model_key, series, Granularity::Day, horizon, self.input.as_of)
        {
            Ok(Some(f)) => {
                let window: Vec<f64> = f
                    .points
                    .iter()
                    .filter(|p| p.date >= self.input.as_of && p.date < end)
                    .map(|p| p.value)
                    .collect();
                forecast_statistics(&window)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %model_key, error = %e, "demand forecast failed; falling back to recent sales");
                None
            }
        }
    }

    fn recent_demand(&self, series: &[TimeSeriesPoint]) -> Option<DemandStatistics> {
        let start = self.input.as_of - Duration::days(i64::from(self.policy.lookback_days));
        let window: Vec<TimeSeriesPoint> = series
            .iter()
            .filter(|p| p.date >= start && p.date <= self.input.as_of)
            .copied()
            .collect();
        recent_statistics(&window)
    }
}

impl AiJob for InventoryOptimizationJob {
    type Input = InventoryInput;
    type Output = InventoryDecision;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<InventoryDecision>, AiError> {
        self.policy.validate()?;

        let products: BTreeSet<ProductId> = self
            .input
            .stock
            .keys()
            .chain(self.input.daily_demand.keys())
            .chain(self.input.forecast_series.keys())
            .copied()
            .collect();

        if products.is_empty() {
            return Ok(AiResult::insufficient("No inventory or sales data found."));
        }

        let mut by_source = BTreeMap::<&'static str, usize>::new();
        let mut records = Vec::with_capacity(products.len());

        for product in products {
            let key = EntityKey::product(self.input.company_id, self.input.warehouse_id, product);
            let series = self
                .input
                .daily_demand
                .get(&product)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let settled = self
                .input
                .forecast_series
                .get(&product)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let demand = resolve_demand(self.forecast_demand(key, settled), self.recent_demand(series));
            *by_source
                .entry(match demand.source {
                    DemandSource::Forecast => "forecast",
                    DemandSource::RecentSales => "recent_sales",
                    DemandSource::Default => "default",
                })
                .or_default() += 1;

            let current = self.input.stock.get(&product).copied().unwrap_or(0.0);
            records.push(decide(key, product, current, demand, &self.policy, &self.model_version));
        }

        let reorders = records.iter().filter(|r| r.suggested_reorder_qty > 0.0).count();
        let metadata = json!({
            "kind": "inventory.optimize",
            "products": records.len(),
            "reorders": reorders,
            "demand_sources": by_source,
            "lead_time_days": self.policy.lead_time_days,
            "service_level_z": self.policy.service_level_z,
        });

        Ok(AiResult::new(records)
            .with_explanation(format!("{reorders} sku(s) at or below reorder point"))
            .with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{ForecastParams, InMemoryModelStore};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn manager() -> Arc<ForecastModelManager> {
        Arc::new(ForecastModelManager::new(
            Arc::new(InMemoryModelStore::new()),
            ForecastParams::default(),
        ))
    }

    fn input(stock: f64, demand: Vec<TimeSeriesPoint>, as_of: NaiveDate) -> InventoryInput {
        let product = ProductId::new(100);
        InventoryInput {
            company_id: CompanyId::new(1),
            warehouse_id: WarehouseId::new(5),
            stock: BTreeMap::from([(product, stock)]),
            daily_demand: if demand.is_empty() {
                BTreeMap::new()
            } else {
                BTreeMap::from([(product, demand.clone())])
            },
            forecast_series: if demand.is_empty() {
                BTreeMap::new()
            } else {
                BTreeMap::from([(product, demand)])
            },
            as_of,
        }
    }

    #[test]
    fn constant_demand_end_to_end() {
        let start = d(2024, 1, 1);
        let series: Vec<TimeSeriesPoint> = (0..90)
            .map(|i| TimeSeriesPoint::new(start + Duration::days(i), 10.0))
            .collect();
        let as_of = start + Duration::days(90);

        let out = InventoryOptimizationJob::new(input(50.0, series, as_of), manager())
            .run()
            .unwrap();
        assert_eq!(out.len(), 1);
        let r = &out.records[0];

        assert_eq!(r.demand_source, DemandSource::Forecast);
        assert_eq!(r.safety_stock, 0.0);
        assert_eq!(r.reorder_point, 70.0);
        assert_eq!(r.suggested_reorder_qty, 20.0);
        assert_eq!(r.optimal_stock_level, 300.0);
        assert_eq!(r.stock_status, StockStatus::Low);
        assert_eq!(r.inventory_health_score, 16.67);
    }

    #[test]
    fn short_history_falls_back_to_recent_sales() {
        let as_of = d(2024, 3, 1);
        let series = vec![
            TimeSeriesPoint::new(d(2024, 2, 20), 4.0),
            TimeSeriesPoint::new(d(2024, 2, 25), 8.0),
        ];
        let out = InventoryOptimizationJob::new(input(100.0, series, as_of), manager())
            .run()
            .unwrap();
        let r = &out.records[0];
        assert_eq!(r.demand_source, DemandSource::RecentSales);
        assert_eq!(r.avg_daily_demand, 6.0);
        assert_eq!(r.std_daily_demand, 2.0);
    }

    #[test]
    fn no_demand_at_all_reads_as_overstock_or_stockout() {
        let as_of = d(2024, 3, 1);
        let stocked = InventoryOptimizationJob::new(input(5.0, vec![], as_of), manager())
            .run()
            .unwrap();
        assert_eq!(stocked.records[0].demand_source, DemandSource::Default);
        assert_eq!(stocked.records[0].stock_status, StockStatus::Overstock);

        let empty = InventoryOptimizationJob::new(input(0.0, vec![], as_of), manager())
            .run()
            .unwrap();
        assert_eq!(empty.records[0].stock_status, StockStatus::Stockout);
    }

    #[test]
    fn forecast_takes_precedence_over_recent_sales() {
        let f = DemandStatistics {
            avg_daily_demand: 3.0,
            std_daily_demand: 1.0,
        };
        let r = DemandStatistics {
            avg_daily_demand: 9.0,
            std_daily_demand: 0.0,
        };
        assert_eq!(resolve_demand(Some(f), Some(r)).source, DemandSource::Forecast);
        assert_eq!(resolve_demand(None, Some(r)).stats, r);
        assert_eq!(resolve_demand(None, None).stats, DemandStatistics::default());
    }

    #[test]
    fn negative_forecast_quantities_are_clamped() {
        let s = forecast_statistics(&[-4.0, 2.0]).unwrap();
        assert_eq!(s.avg_daily_demand, 1.0);
        assert_eq!(s.std_daily_demand, 1.0);
        assert!(forecast_statistics(&[]).is_none());
    }

    #[test]
    fn status_thresholds_follow_the_policy() {
        let reorder = InventoryPolicy::default();
        let safety = InventoryPolicy {
            low_stock_trigger: LowStockTrigger::SafetyStock,
            overstock_multiplier: 1.3,
            ..InventoryPolicy::default()
        };
        // safety 5, reorder 20, optimal 100
        assert_eq!(classify_stock(0.00001, 5.0, 20.0, 100.0, &reorder), StockStatus::Stockout);
        assert_eq!(classify_stock(10.0, 5.0, 20.0, 100.0, &reorder), StockStatus::Low);
        assert_eq!(classify_stock(10.0, 5.0, 20.0, 100.0, &safety), StockStatus::Healthy);
        assert_eq!(classify_stock(120.0, 5.0, 20.0, 100.0, &reorder), StockStatus::Healthy);
        assert_eq!(classify_stock(125.0, 5.0, 20.0, 100.0, &reorder), StockStatus::Overstock);
        assert_eq!(classify_stock(125.0, 5.0, 20.0, 100.0, &safety), StockStatus::Healthy);
    }

    #[test]
    fn invalid_policy_is_rejected_before_computing() {
        let job = InventoryOptimizationJob::new(input(1.0, vec![], d(2024, 1, 1)), manager()).with_policy(
            InventoryPolicy {
                lead_time_days: -1.0,
                ..InventoryPolicy::default()
            },
        );
        match job.run() {
            Err(AiError::InvalidInput(msg)) => assert!(msg.contains("lead_time_days")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: safety stock and reorder point are non-negative and ordered.
            #[test]
            fn reorder_point_never_below_safety_stock(
                avg in 0.0f64..1_000.0,
                std in 0.0f64..500.0,
                z in 0.0f64..4.0,
                lead in 0.0f64..120.0,
            ) {
                let ss = safety_stock(z, std, lead);
                let rop = reorder_point(avg, lead, ss);
                prop_assert!(ss >= 0.0);
                prop_assert!(rop >= ss);
            }

            /// Property: raising z or lead time never lowers safety stock or reorder point.
            #[test]
            fn levels_are_monotonic_in_z_and_lead_time(
                avg in 0.0f64..1_000.0,
                std in 0.0f64..500.0,
                z in 0.0f64..4.0,
                dz in 0.0f64..2.0,
                lead in 0.0f64..120.0,
                dlead in 0.0f64..30.0,
            ) {
                let base_ss = safety_stock(z, std, lead);
                let base_rop = reorder_point(avg, lead, base_ss);

                let ss_z = safety_stock(z + dz, std, lead);
                prop_assert!(ss_z >= base_ss);
                prop_assert!(reorder_point(avg, lead, ss_z) >= base_rop);

                let ss_lead = safety_stock(z, std, lead + dlead);
                prop_assert!(ss_lead >= base_ss);
                prop_assert!(reorder_point(avg, lead + dlead, ss_lead) >= base_rop);
            }

            /// Property: health score stays within [0, 100].
            #[test]
            fn health_score_is_bounded(
                current in -100.0f64..10_000.0,
                optimal in 0.0f64..10_000.0,
            ) {
                let h = inventory_health_score(current, optimal);
                prop_assert!((0.0..=100.0).contains(&h));
            }
        }
    }
}
