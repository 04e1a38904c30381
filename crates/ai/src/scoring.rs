//! Weighted performance scores for suppliers and salespersons.
//!
//! Each score is a fixed weighted sum of bounded [0, 100] component rates.
//! Weights are policy, not learned; they must sum to 1.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{
    CompanyId, DomainError, DomainResult, ModelVersion, NaturalKeyed, PurchaseId, SaleId, SalespersonId,
    SupplierId, WarehouseId,
};

use crate::job::AiJob;
use crate::result::{AiError, AiResult};
use crate::stats::{mean, round2, safe_pct_change, std_population};

const WEIGHT_TOLERANCE: f64 = 1e-6;
/// Ordered and received quantities closer than this count as accurate.
const QUANTITY_TOLERANCE: f64 = 0.01;

fn check_weights(name: &str, weights: &[f64]) -> DomainResult<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(DomainError::validation(format!("{name} weights must be non-negative")));
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(DomainError::validation(format!(
            "{name} weights must sum to 1, got {sum}"
        )));
    }
    Ok(())
}

fn check_period(start: NaiveDate, end: NaiveDate) -> Result<(), AiError> {
    if start > end {
        return Err(AiError::InvalidInput(format!(
            "period start {start} is after end {end}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Suppliers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierWeights {
    pub on_time: f64,
    pub accuracy: f64,
    /// Applied to `100 - rejection_rate`.
    pub rejection: f64,
    pub cost_stability: f64,
}

impl Default for SupplierWeights {
    fn default() -> Self {
        Self {
            on_time: 0.40,
            accuracy: 0.30,
            rejection: 0.10,
            cost_stability: 0.20,
        }
    }
}

impl SupplierWeights {
    pub fn validate(&self) -> DomainResult<()> {
        check_weights(
            "supplier",
            &[self.on_time, self.accuracy, self.rejection, self.cost_stability],
        )
    }
}

/// One approved purchase line from a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierDelivery {
    pub supplier_id: SupplierId,
    pub purchase_id: PurchaseId,
    pub order_date: NaiveDate,
    /// `None` while the goods have not arrived.
    pub days_to_deliver: Option<i64>,
    pub quantity_ordered: f64,
    pub quantity_received: f64,
    pub rejected: bool,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierScore {
    pub company_id: CompanyId,
    pub supplier_id: SupplierId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub deliveries: u32,
    pub on_time_rate: f64,
    pub accuracy_rate: f64,
    pub rejection_rate: f64,
    pub cost_stability: f64,
    pub overall_score: f64,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for SupplierScore {
    type Key = (CompanyId, SupplierId, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.company_id, self.supplier_id, self.model_version.clone())
    }
}

/// Component rates for one supplier, unrounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplierRates {
    pub on_time: f64,
    pub accuracy: f64,
    pub rejection: f64,
    pub cost_stability: f64,
}

impl SupplierRates {
    /// On time means delivered no slower than the supplier's own average;
    /// undelivered lines are late.
    pub fn from_deliveries(rows: &[&SupplierDelivery]) -> Self {
        let n = rows.len().max(1) as f64;
        let delivered: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.days_to_deliver)
            .map(|d| d as f64)
            .collect();
        let mean_days = (!delivered.is_empty()).then(|| mean(&delivered));

        let on_time = rows
            .iter()
            .filter(|r| match (r.days_to_deliver, mean_days) {
                (Some(d), Some(m)) => d as f64 <= m,
                _ => false,
            })
            .count() as f64;
        let accurate = rows
            .iter()
            .filter(|r| (r.quantity_ordered - r.quantity_received).abs() <= QUANTITY_TOLERANCE)
            .count() as f64;
        let rejected = rows.iter().filter(|r| r.rejected).count() as f64;

        let costs: Vec<f64> = rows.iter().map(|r| r.unit_cost).collect();
        let mean_cost = mean(&costs);
        let cost_stability = if mean_cost == 0.0 {
            100.0
        } else {
            (100.0 * (1.0 - std_population(&costs) / mean_cost)).max(0.0)
        };

        Self {
            on_time: on_time / n * 100.0,
            accuracy: accurate / n * 100.0,
            rejection: rejected / n * 100.0,
            cost_stability,
        }
    }

    pub fn overall(&self, w: &SupplierWeights) -> f64 {
        w.on_time * self.on_time
            + w.accuracy * self.accuracy
            + w.rejection * (100.0 - self.rejection)
            + w.cost_stability * self.cost_stability
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplierInput {
    pub company_id: CompanyId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub deliveries: Vec<SupplierDelivery>,
}

pub struct SupplierScoringJob {
    input: SupplierInput,
    weights: SupplierWeights,
    model_version: ModelVersion,
}

impl SupplierScoringJob {
    pub fn new(input: SupplierInput) -> Self {
        Self {
            input,
            weights: SupplierWeights::default(),
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_weights(mut self, weights: SupplierWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }
}

impl AiJob for SupplierScoringJob {
    type Input = SupplierInput;
    type Output = SupplierScore;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<SupplierScore>, AiError> {
        self.weights.validate()?;
        let (start, end) = (self.input.period_start, self.input.period_end);
        check_period(start, end)?;

        let mut by_supplier: BTreeMap<SupplierId, Vec<&SupplierDelivery>> = BTreeMap::new();
        for d in &self.input.deliveries {
            if d.order_date >= start && d.order_date <= end {
                by_supplier.entry(d.supplier_id).or_default().push(d);
            }
        }
        if by_supplier.is_empty() {
            return Ok(AiResult::insufficient("No purchase data found for the period."));
        }

        let records: Vec<SupplierScore> = by_supplier
            .into_iter()
            .map(|(supplier_id, rows)| {
                let rates = SupplierRates::from_deliveries(&rows);
                SupplierScore {
                    company_id: self.input.company_id,
                    supplier_id,
                    period_start: start,
                    period_end: end,
                    deliveries: rows.len() as u32,
                    on_time_rate: round2(rates.on_time),
                    accuracy_rate: round2(rates.accuracy),
                    rejection_rate: round2(rates.rejection),
                    cost_stability: round2(rates.cost_stability),
                    overall_score: round2(rates.overall(&self.weights)),
                    model_version: self.model_version.clone(),
                }
            })
            .collect();

        let metadata = json!({
            "kind": "scoring.supplier",
            "suppliers": records.len(),
            "period_start": start,
            "period_end": end,
        });
        let explanation = format!("{} supplier(s) scored", records.len());
        Ok(AiResult::new(records)
            .with_explanation(explanation)
            .with_metadata(metadata))
    }
}

// ---------------------------------------------------------------------------
// Salespersons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalespersonWeights {
    pub sales: f64,
    pub avg_order_value: f64,
    pub growth: f64,
}

impl Default for SalespersonWeights {
    fn default() -> Self {
        Self {
            sales: 0.55,
            avg_order_value: 0.20,
            growth: 0.25,
        }
    }
}

impl SalespersonWeights {
    pub fn validate(&self) -> DomainResult<()> {
        check_weights("salesperson", &[self.sales, self.avg_order_value, self.growth])
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn from_growth(growth_pct: f64) -> Self {
        if growth_pct > 5.0 {
            Trend::Up
        } else if growth_pct < -5.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }
}

/// A settled sale attributed to a salesperson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalespersonOrder {
    pub salesperson_id: SalespersonId,
    pub sale_id: SaleId,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalespersonScore {
    pub company_id: CompanyId,
    pub warehouse_id: Option<WarehouseId>,
    pub salesperson_id: SalespersonId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_sales: f64,
    pub order_count: u32,
    pub avg_order_value: f64,
    pub previous_sales: f64,
    pub growth_pct: f64,
    pub trend: Trend,
    pub score: f64,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for SalespersonScore {
    type Key = (CompanyId, Option<WarehouseId>, SalespersonId, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.company_id,
            self.warehouse_id,
            self.salesperson_id,
            self.model_version.clone(),
        )
    }
}

/// Weighted score in [0, 100]. A zero maximum contributes zero.
pub fn salesperson_score(
    sales: f64,
    max_sales: f64,
    aov: f64,
    max_aov: f64,
    growth_pct: f64,
    w: &SalespersonWeights,
) -> f64 {
    let share = |v: f64, max: f64| if max > 0.0 { v / max } else { 0.0 };
    let growth = (growth_pct.clamp(-50.0, 50.0) + 50.0) / 100.0;
    (w.sales * share(sales, max_sales) + w.avg_order_value * share(aov, max_aov) + w.growth * growth) * 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalespersonInput {
    pub company_id: CompanyId,
    pub warehouse_id: Option<WarehouseId>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Orders from both the period and the equal-length period before it.
    pub orders: Vec<SalespersonOrder>,
}

pub struct SalespersonScoringJob {
    input: SalespersonInput,
    weights: SalespersonWeights,
    model_version: ModelVersion,
}

impl SalespersonScoringJob {
    pub fn new(input: SalespersonInput) -> Self {
        Self {
            input,
            weights: SalespersonWeights::default(),
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_weights(mut self, weights: SalespersonWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }

    /// `[start - days, start - 1]` where `days` is the current period length.
    pub fn previous_period(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        let days = (end - start).num_days() + 1;
        (start - Duration::days(days), start - Duration::days(1))
    }
}

#[derive(Default)]
struct Tally {
    sales: f64,
    orders: BTreeSet<SaleId>,
    previous: f64,
}

impl AiJob for SalespersonScoringJob {
    type Input = SalespersonInput;
    type Output = SalespersonScore;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<SalespersonScore>, AiError> {
        self.weights.validate()?;
        let (start, end) = (self.input.period_start, self.input.period_end);
        check_period(start, end)?;
        let (prev_start, prev_end) = Self::previous_period(start, end);

        let mut tallies: BTreeMap<SalespersonId, Tally> = BTreeMap::new();
        for o in &self.input.orders {
            if !o.amount.is_finite() {
                continue;
            }
            if o.date >= start && o.date <= end {
                let t = tallies.entry(o.salesperson_id).or_default();
                t.sales += o.amount;
                t.orders.insert(o.sale_id);
            } else if o.date >= prev_start && o.date <= prev_end {
                tallies.entry(o.salesperson_id).or_default().previous += o.amount;
            }
        }
        tallies.retain(|_, t| !t.orders.is_empty());

        if tallies.is_empty() {
            return Ok(AiResult::insufficient("No salesperson sales found for the period."));
        }

        let aov = |t: &Tally| t.sales / t.orders.len() as f64;
        let max_sales = tallies.values().map(|t| t.sales).fold(0.0, f64::max);
        let max_aov = tallies.values().map(aov).fold(0.0, f64::max);

        let records: Vec<SalespersonScore> = tallies
            .iter()
            .map(|(id, t)| {
                let growth = safe_pct_change(t.sales, t.previous);
                let score = salesperson_score(t.sales, max_sales, aov(t), max_aov, growth, &self.weights);
                SalespersonScore {
                    company_id: self.input.company_id,
                    warehouse_id: self.input.warehouse_id,
                    salesperson_id: *id,
                    period_start: start,
                    period_end: end,
                    total_sales: round2(t.sales),
                    order_count: t.orders.len() as u32,
                    avg_order_value: round2(aov(t)),
                    previous_sales: round2(t.previous),
                    growth_pct: round2(growth),
                    trend: Trend::from_growth(growth),
                    score: round2(score),
                    model_version: self.model_version.clone(),
                }
            })
            .collect();

        let metadata = json!({
            "kind": "scoring.salesperson",
            "salespersons": records.len(),
            "period_start": start,
            "period_end": end,
            "previous_start": prev_start,
            "previous_end": prev_end,
        });
        let explanation = format!("{} salesperson(s) scored", records.len());
        Ok(AiResult::new(records)
            .with_explanation(explanation)
            .with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn delivery(supplier: i64, days: Option<i64>, ordered: f64, received: f64, cost: f64) -> SupplierDelivery {
        SupplierDelivery {
            supplier_id: SupplierId::new(supplier),
            purchase_id: PurchaseId::new(1),
            order_date: d(2024, 3, 10),
            days_to_deliver: days,
            quantity_ordered: ordered,
            quantity_received: received,
            rejected: false,
            unit_cost: cost,
        }
    }

    fn supplier_job(deliveries: Vec<SupplierDelivery>) -> SupplierScoringJob {
        SupplierScoringJob::new(SupplierInput {
            company_id: CompanyId::new(1),
            period_start: d(2024, 3, 1),
            period_end: d(2024, 3, 31),
            deliveries,
        })
    }

    #[test]
    fn perfect_supplier_scores_one_hundred() {
        let rows = vec![
            delivery(1, Some(3), 10.0, 10.0, 5.0),
            delivery(1, Some(3), 20.0, 20.0, 5.0),
        ];
        let out = supplier_job(rows).run().unwrap();
        let s = &out.records[0];
        assert_eq!(s.on_time_rate, 100.0);
        assert_eq!(s.accuracy_rate, 100.0);
        assert_eq!(s.rejection_rate, 0.0);
        assert_eq!(s.cost_stability, 100.0);
        assert_eq!(s.overall_score, 100.0);
    }

    #[test]
    fn undelivered_lines_are_late_and_inaccurate() {
        let mut rejected = delivery(1, Some(2), 10.0, 10.0, 4.0);
        rejected.rejected = true;
        let rows = vec![
            rejected,
            delivery(1, Some(6), 10.0, 10.0, 4.0),
            delivery(1, None, 10.0, 0.0, 4.0),
            delivery(1, Some(4), 10.0, 9.0, 4.0),
        ];
        let out = supplier_job(rows).run().unwrap();
        let s = &out.records[0];
        // mean days = 4: the 2-day and 4-day lines are on time
        assert_eq!(s.on_time_rate, 50.0);
        assert_eq!(s.accuracy_rate, 50.0);
        assert_eq!(s.rejection_rate, 25.0);
        // .4*50 + .3*50 + .1*75 + .2*100
        assert_eq!(s.overall_score, 62.5);
    }

    #[test]
    fn zero_cost_is_perfectly_stable() {
        let rows = [delivery(1, Some(1), 1.0, 1.0, 0.0)];
        let refs: Vec<&SupplierDelivery> = rows.iter().collect();
        assert_eq!(SupplierRates::from_deliveries(&refs).cost_stability, 100.0);
    }

    #[test]
    fn volatile_costs_floor_at_zero() {
        let rows = [
            delivery(1, Some(1), 1.0, 1.0, 1.0),
            delivery(1, Some(1), 1.0, 1.0, 1.0),
            delivery(1, Some(1), 1.0, 1.0, 1.0),
            delivery(1, Some(1), 1.0, 1.0, 100.0),
        ];
        let refs: Vec<&SupplierDelivery> = rows.iter().collect();
        assert_eq!(SupplierRates::from_deliveries(&refs).cost_stability, 0.0);
    }

    #[test]
    fn orders_outside_the_period_are_ignored() {
        let mut old = delivery(2, Some(1), 1.0, 1.0, 1.0);
        old.order_date = d(2023, 1, 1);
        let out = supplier_job(vec![old]).run().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let job = supplier_job(vec![]).with_weights(SupplierWeights {
            on_time: 0.5,
            ..SupplierWeights::default()
        });
        assert!(matches!(job.run(), Err(AiError::InvalidInput(_))));
        assert!(SalespersonWeights::default().validate().is_ok());
    }

    fn sale(person: i64, sale: i64, date: NaiveDate, amount: f64) -> SalespersonOrder {
        SalespersonOrder {
            salesperson_id: SalespersonId::new(person),
            sale_id: SaleId::new(sale),
            date,
            amount,
        }
    }

    #[test]
    fn previous_period_has_equal_length() {
        let (s, e) = SalespersonScoringJob::previous_period(d(2024, 3, 1), d(2024, 3, 31));
        assert_eq!((s, e), (d(2024, 1, 30), d(2024, 2, 29)));
    }

    #[test]
    fn salespersons_are_scored_against_the_leader_and_their_own_history() {
        let orders = vec![
            sale(1, 1, d(2024, 3, 5), 600.0),
            sale(1, 2, d(2024, 3, 6), 400.0),
            sale(1, 3, d(2024, 2, 10), 500.0),
            sale(2, 4, d(2024, 3, 7), 250.0),
            sale(3, 5, d(2024, 2, 10), 900.0),
        ];
        let out = SalespersonScoringJob::new(SalespersonInput {
            company_id: CompanyId::new(1),
            warehouse_id: Some(WarehouseId::new(5)),
            period_start: d(2024, 3, 1),
            period_end: d(2024, 3, 31),
            orders,
        })
        .run()
        .unwrap();

        assert_eq!(out.len(), 2);
        let leader = &out.records[0];
        assert_eq!(leader.total_sales, 1000.0);
        assert_eq!(leader.avg_order_value, 500.0);
        assert_eq!(leader.growth_pct, 100.0);
        assert_eq!(leader.trend, Trend::Up);
        assert_eq!(leader.score, 100.0);

        let other = &out.records[1];
        // no previous sales: growth counts as 100
        assert_eq!(other.growth_pct, 100.0);
        // .55*.25 + .20*.5 + .25*1
        assert_eq!(other.score, 48.75);
    }

    #[test]
    fn growth_bands_map_to_trends() {
        assert_eq!(Trend::from_growth(5.0), Trend::Flat);
        assert_eq!(Trend::from_growth(-5.01), Trend::Down);
        assert_eq!(Trend::from_growth(0.0), Trend::Flat);
    }
}
