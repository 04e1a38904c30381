//! Monthly profitability and cash-flow pipelines.
//!
//! Both take monthly series already bucketed by the caller and use the
//! forecast model manager with month granularity for the forward view.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{
    CompanyId, EntityKey, Granularity, ModelVersion, NaturalKeyed, TimeSeriesPoint, WarehouseId,
};

use crate::forecast::{ForecastModelManager, ForecastTarget, ModelKey};
use crate::job::AiJob;
use crate::result::{AiError, AiResult};
use crate::stats::{round2, std_sample};

/// Months forecast past the last reported month.
pub const PROFIT_FORECAST_MONTHS: usize = 3;

fn next_month(month: NaiveDate) -> Result<NaiveDate, AiError> {
    Granularity::Month
        .next(month)
        .ok_or_else(|| AiError::Internal("month range overflow".to_string()))
}

fn by_month(series: &[TimeSeriesPoint]) -> BTreeMap<NaiveDate, f64> {
    let mut out = BTreeMap::new();
    for p in series {
        *out.entry(Granularity::Month.bucket(p.date)).or_insert(0.0) += p.value;
    }
    out
}

// ---------------------------------------------------------------------------
// Profitability
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfitTrend {
    Rising,
    Falling,
    Stable,
}

/// One month of profitability. Forecast-only months carry just
/// `forecast_profit`; reported months carry everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityRecord {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub month: NaiveDate,
    pub revenue: Option<f64>,
    pub cogs: Option<f64>,
    pub expenses: Option<f64>,
    pub net_profit: Option<f64>,
    pub margin_pct: Option<f64>,
    pub trend: Option<ProfitTrend>,
    pub forecast_profit: Option<f64>,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for ProfitabilityRecord {
    type Key = (CompanyId, WarehouseId, NaiveDate, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.company_id,
            self.warehouse_id,
            self.month,
            self.model_version.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitabilityInput {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    /// Settled sales revenue per month.
    pub revenue: Vec<TimeSeriesPoint>,
    /// Received cost of approved purchases per month.
    pub cogs: Vec<TimeSeriesPoint>,
    /// Approved expenses per month.
    pub expenses: Vec<TimeSeriesPoint>,
    pub as_of: NaiveDate,
}

pub struct ProfitabilityJob {
    input: ProfitabilityInput,
    manager: Arc<ForecastModelManager>,
    model_version: ModelVersion,
}

impl ProfitabilityJob {
    pub fn new(input: ProfitabilityInput, manager: Arc<ForecastModelManager>) -> Self {
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

    fn record(&self, month: NaiveDate) -> ProfitabilityRecord {
        ProfitabilityRecord {
            company_id: self.input.company_id,
            warehouse_id: self.input.warehouse_id,
            month,
            revenue: None,
            cogs: None,
            expenses: None,
            net_profit: None,
            margin_pct: None,
            trend: None,
            forecast_profit: None,
            model_version: self.model_version.clone(),
        }
    }
}

impl AiJob for ProfitabilityJob {
    type Input = ProfitabilityInput;
    type Output = ProfitabilityRecord;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<ProfitabilityRecord>, AiError> {
        let revenue = by_month(&self.input.revenue);
        let cogs = by_month(&self.input.cogs);
        let expenses = by_month(&self.input.expenses);

        let observed: BTreeSet<NaiveDate> = revenue
            .keys()
            .chain(cogs.keys())
            .chain(expenses.keys())
            .copied()
            .collect();
        let (Some(first), Some(last)) = (observed.first().copied(), observed.last().copied()) else {
            return Ok(AiResult::insufficient("No financial data found."));
        };
        let last = last.max(Granularity::Month.bucket(self.input.as_of));

        let mut records = Vec::new();
        let mut net_series = Vec::new();
        let mut previous_net: Option<f64> = None;
        let mut month = first;
        loop {
            let rev = revenue.get(&month).copied().unwrap_or(0.0);
            let cost = cogs.get(&month).copied().unwrap_or(0.0);
            let exp = expenses.get(&month).copied().unwrap_or(0.0);
            let net = rev - cost - exp;
            let margin = if rev > 0.0 { net / rev * 100.0 } else { 0.0 };
            let trend = match previous_net.map(|p| net - p) {
                Some(diff) if diff > 0.0 => ProfitTrend::Rising,
                Some(diff) if diff < 0.0 => ProfitTrend::Falling,
                _ => ProfitTrend::Stable,
            };

            let mut r = self.record(month);
            r.revenue = Some(round2(rev));
            r.cogs = Some(round2(cost));
            r.expenses = Some(round2(exp));
            r.net_profit = Some(round2(net));
            r.margin_pct = Some(round2(margin));
            r.trend = Some(trend);
            records.push(r);

            net_series.push(TimeSeriesPoint::new(month, net));
            previous_net = Some(net);

            if month >= last {
                break;
            }
            month = next_month(month)?;
        }

        // A reused model may end before `last`; forecast months never
        // overlap reported ones.
        let first_forecast = next_month(last)?;
        let key = ModelKey::new(
            ForecastTarget::NetProfit,
            EntityKey::warehouse(self.input.company_id, self.input.warehouse_id),
        );
        let forecast = self.manager.forecast(
            &key,
            &net_series,
            Granularity::Month,
            PROFIT_FORECAST_MONTHS,
            first_forecast,
        )?;
        let forecast_months = match forecast {
            Some(f) => {
                let n = f.points.len();
                records.extend(f.points.into_iter().map(|p| {
                    let mut r = self.record(p.date);
                    r.forecast_profit = Some(round2(p.value));
                    r
                }));
                n
            }
            None => 0,
        };

        let metadata = json!({
            "kind": "finance.profitability",
            "months": net_series.len(),
            "forecast_months": forecast_months,
        });
        let explanation = format!(
            "{} reported month(s), {forecast_months} forecast month(s)",
            net_series.len()
        );
        Ok(AiResult::new(records)
            .with_explanation(explanation)
            .with_metadata(metadata))
    }
}

// ---------------------------------------------------------------------------
// Cash flow
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashRisk {
    Low,
    Medium,
    High,
}

impl CashRisk {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            CashRisk::Low
        } else if score >= 50.0 {
            CashRisk::Medium
        } else {
            CashRisk::High
        }
    }
}

/// Cash safety from the balance measured in standard deviations.
pub fn cash_health_score(balance: f64, std: f64) -> f64 {
    if std <= 0.0 {
        return if balance > 0.0 { 90.0 } else { 30.0 };
    }
    let ratio = balance / std;
    if ratio > 4.0 {
        95.0
    } else if ratio > 2.0 {
        80.0
    } else if ratio > 1.0 {
        65.0
    } else if ratio > 0.0 {
        50.0
    } else {
        20.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowRecord {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub month: NaiveDate,
    pub cash_inflows: f64,
    pub cash_outflows: f64,
    pub net_cashflow: f64,
    pub cash_balance: f64,
    pub cash_health_score: f64,
    pub risk_level: CashRisk,
    pub forecasted_next_balance: f64,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for CashflowRecord {
    type Key = (CompanyId, WarehouseId, NaiveDate, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.company_id,
            self.warehouse_id,
            self.month,
            self.model_version.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashflowInput {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    /// Payments received per month.
    pub inflows: Vec<TimeSeriesPoint>,
    /// Approved purchase cost per month.
    pub purchases: Vec<TimeSeriesPoint>,
    /// Approved expenses per month.
    pub expenses: Vec<TimeSeriesPoint>,
    pub as_of: NaiveDate,
}

pub struct CashflowJob {
    input: CashflowInput,
    manager: Arc<ForecastModelManager>,
    model_version: ModelVersion,
}

impl CashflowJob {
    pub fn new(input: CashflowInput, manager: Arc<ForecastModelManager>) -> Self {
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
}

impl AiJob for CashflowJob {
    type Input = CashflowInput;
    type Output = CashflowRecord;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<CashflowRecord>, AiError> {
        let inflows = by_month(&self.input.inflows);
        let purchases = by_month(&self.input.purchases);
        let expenses = by_month(&self.input.expenses);

        // Only months with activity; no gap filling.
        let months: BTreeSet<NaiveDate> = inflows
            .keys()
            .chain(purchases.keys())
            .chain(expenses.keys())
            .copied()
            .collect();
        if months.is_empty() {
            return Ok(AiResult::insufficient("No cash flow data found."));
        }

        let mut balance = 0.0;
        let rows: Vec<(NaiveDate, f64, f64, f64, f64)> = months
            .iter()
            .map(|m| {
                let inflow = inflows.get(m).copied().unwrap_or(0.0);
                let outflow =
                    purchases.get(m).copied().unwrap_or(0.0) + expenses.get(m).copied().unwrap_or(0.0);
                let net = inflow - outflow;
                balance += net;
                (*m, inflow, outflow, net, balance)
            })
            .collect();

        let balances: Vec<f64> = rows.iter().map(|r| r.4).collect();
        let std_cash = if balances.len() > 1 { std_sample(&balances) } else { 1.0 };
        let last_balance = balance;
        let last_month = rows.last().map(|r| r.0).unwrap_or(self.input.as_of);
        let next = next_month(last_month)?.max(Granularity::Month.bucket(self.input.as_of));

        let key = ModelKey::new(
            ForecastTarget::CashBalance,
            EntityKey::warehouse(self.input.company_id, self.input.warehouse_id),
        );
        let series: Vec<TimeSeriesPoint> = rows.iter().map(|r| TimeSeriesPoint::new(r.0, r.4)).collect();
        let forecasted = self
            .manager
            .forecast(&key, &series, Granularity::Month, 1, next)?
            .and_then(|f| f.points.first().map(|p| p.value))
            .unwrap_or(last_balance);
        let forecasted = round2(forecasted);

        let records: Vec<CashflowRecord> = rows
            .into_iter()
            .map(|(month, inflow, outflow, net, bal)| {
                let score = cash_health_score(bal, std_cash);
                CashflowRecord {
                    company_id: self.input.company_id,
                    warehouse_id: self.input.warehouse_id,
                    month,
                    cash_inflows: round2(inflow),
                    cash_outflows: round2(outflow),
                    net_cashflow: round2(net),
                    cash_balance: round2(bal),
                    cash_health_score: score,
                    risk_level: CashRisk::from_score(score),
                    forecasted_next_balance: forecasted,
                    model_version: self.model_version.clone(),
                }
            })
            .collect();

        let metadata = json!({
            "kind": "finance.cashflow",
            "months": records.len(),
            "balance_std": std_cash,
            "forecasted_next_balance": forecasted,
        });
        let explanation = format!("{} month(s) of cash flow", records.len());
        Ok(AiResult::new(records)
            .with_explanation(explanation)
            .with_metadata(metadata))
    }
}
