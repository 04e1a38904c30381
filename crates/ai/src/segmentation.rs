//! RFM customer segmentation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{
    CompanyId, CustomerId, DomainError, DomainResult, ModelVersion, NaturalKeyed, SaleId, WarehouseId,
};

use crate::job::AiJob;
use crate::result::{AiError, AiResult};
use crate::stats::{median, quantile_sorted, round2};

/// The only grouping column customer rows carry.
pub const CUSTOMER_COLUMN: &str = "customer_id";

/// Validates a caller-supplied grouping column name.
pub fn check_customer_column(column: &str) -> DomainResult<()> {
    let mut chars = column.chars();
    let safe = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !safe {
        return Err(DomainError::validation(format!(
            "customer_column {column:?} is not a valid identifier"
        )));
    }
    if column != CUSTOMER_COLUMN {
        return Err(DomainError::validation(format!(
            "unsupported customer_column {column:?}; expected {CUSTOMER_COLUMN}"
        )));
    }
    Ok(())
}

/// Equal-frequency 5-bin scores with linear-interpolated edges.
///
/// Bins are right-closed with the lowest edge included; `labels[i]` is the
/// score for bin `i`. Returns `None` when the edges are not strictly
/// increasing (too few distinct values).
pub fn quintile_scores(values: &[f64], labels: [u8; 5]) -> Option<Vec<u8>> {
    if values.is_empty() {
        return Some(Vec::new());
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let edges: Vec<f64> = (0..=5).map(|i| quantile_sorted(&sorted, i as f64 / 5.0)).collect();
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return None;
    }

    Some(
        values
            .iter()
            .map(|x| {
                let bin = (0..5).find(|i| *x <= edges[i + 1]).unwrap_or(4);
                labels[bin]
            })
            .collect(),
    )
}

/// 1-based ranks; ties are broken by position.
pub fn rank_first(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]).then(a.cmp(b)));
    let mut ranks = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = (rank + 1) as f64;
    }
    ranks
}

fn median_split(values: &[f64], at_or_below: u8, above: u8) -> Vec<u8> {
    let m = median(values);
    values
        .iter()
        .map(|v| if *v <= m { at_or_below } else { above })
        .collect()
}

/// Recency scores: fewer days scores higher.
pub fn recency_scores(days: &[f64]) -> Vec<u8> {
    quintile_scores(days, [5, 4, 3, 2, 1]).unwrap_or_else(|| median_split(days, 5, 3))
}

/// Frequency / monetary scores over first-ranks of the values.
pub fn ranked_scores(values: &[f64]) -> Vec<u8> {
    quintile_scores(&rank_first(values), [1, 2, 3, 4, 5]).unwrap_or_else(|| median_split(values, 2, 4))
}

pub fn clv_score(r: u8, f: u8, m: u8) -> f64 {
    round2((f64::from(r + f + m) / 15.0 * 100.0).clamp(0.0, 100.0))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    Loyal,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Churn Risk")]
    ChurnRisk,
    New,
}

impl Segment {
    pub fn from_clv(clv: f64) -> Self {
        if clv >= 80.0 {
            Segment::Champions
        } else if clv >= 60.0 {
            Segment::Loyal
        } else if clv >= 40.0 {
            Segment::AtRisk
        } else if clv >= 20.0 {
            Segment::ChurnRisk
        } else {
            Segment::New
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSegment {
    pub company_id: CompanyId,
    pub warehouse_id: Option<WarehouseId>,
    pub customer_id: CustomerId,
    pub recency_days: i64,
    pub frequency: u32,
    pub monetary_value: f64,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
    pub clv_score: f64,
    pub segment: Segment,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for CustomerSegment {
    type Key = (CompanyId, Option<WarehouseId>, CustomerId, ModelVersion);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.company_id,
            self.warehouse_id,
            self.customer_id,
            self.model_version.clone(),
        )
    }
}

/// A settled order attributed to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub customer_id: CustomerId,
    pub sale_id: SaleId,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationInput {
    pub company_id: CompanyId,
    /// `None` segments across every warehouse of the company.
    pub warehouse_id: Option<WarehouseId>,
    pub orders: Vec<CustomerOrder>,
    pub as_of: NaiveDate,
}

pub struct SegmentationJob {
    input: SegmentationInput,
    days_window: u32,
    model_version: ModelVersion,
}

impl SegmentationJob {
    pub fn new(input: SegmentationInput) -> Self {
        Self {
            input,
            days_window: 365,
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_days_window(mut self, days_window: u32) -> Self {
        self.days_window = days_window;
        self
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }
}

#[derive(Default)]
struct Rfm {
    last: Option<NaiveDate>,
    sales: BTreeSet<SaleId>,
    monetary: f64,
}

impl AiJob for SegmentationJob {
    type Input = SegmentationInput;
    type Output = CustomerSegment;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<CustomerSegment>, AiError> {
        if self.days_window == 0 {
            return Err(AiError::InvalidInput("days_window must be positive".to_string()));
        }
        let as_of = self.input.as_of;
        let start = as_of - Duration::days(i64::from(self.days_window));

        let mut by_customer: BTreeMap<CustomerId, Rfm> = BTreeMap::new();
        for o in &self.input.orders {
            if o.date < start || o.date > as_of || !o.amount.is_finite() {
                continue;
            }
            let rfm = by_customer.entry(o.customer_id).or_default();
            rfm.last = rfm.last.max(Some(o.date));
            rfm.sales.insert(o.sale_id);
            rfm.monetary += o.amount;
        }

        if by_customer.is_empty() {
            return Ok(AiResult::insufficient("No customer sales found in the window."));
        }

        let customers: Vec<CustomerId> = by_customer.keys().copied().collect();
        let recency: Vec<i64> = by_customer
            .values()
            .map(|r| r.last.map_or(0, |d| (as_of - d).num_days().max(0)))
            .collect();
        let frequency: Vec<f64> = by_customer.values().map(|r| r.sales.len() as f64).collect();
        let monetary: Vec<f64> = by_customer.values().map(|r| r.monetary).collect();

        let r_scores = recency_scores(&recency.iter().map(|d| *d as f64).collect::<Vec<_>>());
        let f_scores = ranked_scores(&frequency);
        let m_scores = ranked_scores(&monetary);

        let records: Vec<CustomerSegment> = (0..customers.len())
            .map(|i| {
                let clv = clv_score(r_scores[i], f_scores[i], m_scores[i]);
                CustomerSegment {
                    company_id: self.input.company_id,
                    warehouse_id: self.input.warehouse_id,
                    customer_id: customers[i],
                    recency_days: recency[i],
                    frequency: frequency[i] as u32,
                    monetary_value: round2(monetary[i]),
                    r_score: r_scores[i],
                    f_score: f_scores[i],
                    m_score: m_scores[i],
                    clv_score: clv,
                    segment: Segment::from_clv(clv),
                    model_version: self.model_version.clone(),
                }
            })
            .collect();

        let champions = records.iter().filter(|r| r.segment == Segment::Champions).count();
        let metadata = json!({
            "kind": "segmentation.rfm",
            "customers": records.len(),
            "champions": champions,
            "days_window": self.days_window,
        });
        let explanation = format!("{} customer(s) segmented", records.len());
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

    fn order(customer: i64, sale: i64, date: NaiveDate, amount: f64) -> CustomerOrder {
        CustomerOrder {
            customer_id: CustomerId::new(customer),
            sale_id: SaleId::new(sale),
            date,
            amount,
        }
    }

    fn run(orders: Vec<CustomerOrder>) -> AiResult<CustomerSegment> {
        SegmentationJob::new(SegmentationInput {
            company_id: CompanyId::new(1),
            warehouse_id: None,
            orders,
            as_of: d(2024, 6, 30),
        })
        .run()
        .unwrap()
    }

    #[test]
    fn distinct_monetary_values_span_all_five_scores() {
        let orders = (1..=5)
            .map(|c| order(c, c, d(2024, 6, 1), 100.0 * c as f64))
            .collect();
        let out = run(orders);
        let m: Vec<u8> = out.records.iter().map(|r| r.m_score).collect();
        assert_eq!(m, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn identical_recency_falls_back_to_the_median_split() {
        assert_eq!(recency_scores(&[10.0, 10.0, 10.0]), vec![5, 5, 5]);
        assert_eq!(recency_scores(&[1.0, 1.0, 1.0, 9.0]), vec![5, 5, 5, 3]);
    }

    #[test]
    fn single_customer_uses_fallback_scores() {
        let out = run(vec![order(7, 1, d(2024, 6, 20), 50.0)]);
        let r = &out.records[0];
        assert_eq!((r.r_score, r.f_score, r.m_score), (5, 2, 2));
        assert_eq!(r.clv_score, 60.0);
        assert_eq!(r.segment, Segment::Loyal);
        assert_eq!(r.recency_days, 10);
    }

    #[test]
    fn frequency_counts_distinct_sales_within_the_window() {
        let out = run(vec![
            order(1, 1, d(2024, 6, 1), 10.0),
            order(1, 1, d(2024, 6, 1), 5.0),
            order(1, 2, d(2024, 6, 5), 5.0),
            order(1, 3, d(2022, 1, 1), 999.0),
        ]);
        let r = &out.records[0];
        assert_eq!(r.frequency, 2);
        assert_eq!(r.monetary_value, 20.0);
    }

    #[test]
    fn segments_follow_clv_bands() {
        assert_eq!(Segment::from_clv(80.0), Segment::Champions);
        assert_eq!(Segment::from_clv(79.99), Segment::Loyal);
        assert_eq!(Segment::from_clv(40.0), Segment::AtRisk);
        assert_eq!(Segment::from_clv(20.0), Segment::ChurnRisk);
        assert_eq!(Segment::from_clv(19.0), Segment::New);
        assert_eq!(serde_json::to_string(&Segment::AtRisk).unwrap(), "\"At Risk\"");
    }

    #[test]
    fn only_the_customer_id_column_is_accepted() {
        assert!(check_customer_column("customer_id").is_ok());
        assert!(check_customer_column("client_id").is_err());
        assert!(check_customer_column("customer_id; drop table").is_err());
        assert!(check_customer_column("").is_err());
    }

    #[test]
    fn empty_window_is_an_empty_success() {
        let out = run(vec![order(1, 1, d(2020, 1, 1), 10.0)]);
        assert!(out.is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: every score is 1..=5 and CLV stays within [0, 100].
            #[test]
            fn scores_and_clv_are_bounded(
                values in proptest::collection::vec(0.0f64..10_000.0, 1..60),
            ) {
                let r = recency_scores(&values);
                let m = ranked_scores(&values);
                prop_assert_eq!(r.len(), values.len());
                for i in 0..values.len() {
                    prop_assert!((1..=5).contains(&r[i]));
                    prop_assert!((1..=5).contains(&m[i]));
                    let clv = clv_score(r[i], m[i], m[i]);
                    prop_assert!((0.0..=100.0).contains(&clv));
                }
            }
        }
    }
}
