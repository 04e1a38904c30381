use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use insight_core::{CompanyId, ModelVersion, NaturalKeyed, SaleId, WarehouseId};

use crate::anomaly::ensemble::{AnomalyConfig, AnomalyLevel, Ensemble, POLICY_CODE};
use crate::job::AiJob;
use crate::result::{AiError, AiResult};

/// What a scored amount belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalySubject {
    Sale { sale_id: SaleId },
    Day { warehouse_id: WarehouseId, date: NaiveDate },
}

/// One scalar amount to score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub subject: AnomalySubject,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyInput {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    /// Scored as one series, in the given order.
    pub observations: Vec<Observation>,
}

/// A flagged observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub subject: AnomalySubject,
    pub policy_code: String,
    pub amount: f64,
    /// Combined ensemble severity.
    pub score: f64,
    pub level: AnomalyLevel,
    pub reason: String,
    pub model_version: ModelVersion,
}

impl NaturalKeyed for AnomalyRecord {
    type Key = (CompanyId, AnomalySubject, String);

    fn company_id(&self) -> CompanyId {
        self.company_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.company_id, self.subject, self.policy_code.clone())
    }
}

/// Scores a warehouse's sales amounts with the standard ensemble and emits
/// only the anomalous ones.
pub struct SalesAnomalyJob {
    input: AnomalyInput,
    config: AnomalyConfig,
    model_version: ModelVersion,
}

impl SalesAnomalyJob {
    pub fn new(input: AnomalyInput) -> Self {
        Self {
            input,
            config: AnomalyConfig::default(),
            model_version: ModelVersion::default(),
        }
    }

    pub fn with_config(mut self, config: AnomalyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_model_version(mut self, model_version: ModelVersion) -> Self {
        self.model_version = model_version;
        self
    }
}

impl AiJob for SalesAnomalyJob {
    type Input = AnomalyInput;
    type Output = AnomalyRecord;

    fn company_id(&self) -> CompanyId {
        self.input.company_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult<AnomalyRecord>, AiError> {
        let observations = &self.input.observations;
        if let Some(bad) = observations.iter().find(|o| !o.amount.is_finite()) {
            return Err(AiError::InvalidInput(format!(
                "non-finite amount for {:?}",
                bad.subject
            )));
        }
        if observations.is_empty() {
            return Ok(AiResult::insufficient("No sales data found."));
        }

        let values: Vec<f64> = observations.iter().map(|o| o.amount).collect();
        let verdicts = Ensemble::standard(&self.config).evaluate(&values);

        let records: Vec<AnomalyRecord> = observations
            .iter()
            .zip(verdicts)
            .filter(|(_, v)| v.flagged)
            .map(|(o, v)| AnomalyRecord {
                company_id: self.input.company_id,
                warehouse_id: self.input.warehouse_id,
                subject: o.subject,
                policy_code: POLICY_CODE.to_string(),
                amount: o.amount,
                score: v.severity,
                level: v.level,
                reason: v.reason,
                model_version: self.model_version.clone(),
            })
            .collect();

        let alerts = records.iter().filter(|r| r.level == AnomalyLevel::Alert).count();
        let metadata = json!({
            "kind": "anomaly.sales",
            "policy_code": POLICY_CODE,
            "observations": observations.len(),
            "flagged": records.len(),
            "alerts": alerts,
        });

        if records.is_empty() {
            return Ok(AiResult::insufficient("No anomalies found.").with_metadata(metadata));
        }

        tracing::debug!(
            company = %self.input.company_id,
            warehouse = %self.input.warehouse_id,
            flagged = records.len(),
            alerts,
            "sales anomalies scored"
        );

        let explanation = format!(
            "{} of {} observation(s) flagged, {alerts} alert(s)",
            records.len(),
            observations.len()
        );
        Ok(AiResult::new(records)
            .with_explanation(explanation)
            .with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sales(amounts: &[f64]) -> SalesAnomalyJob {
        SalesAnomalyJob::new(AnomalyInput {
            company_id: CompanyId::new(1),
            warehouse_id: WarehouseId::new(5),
            observations: amounts
                .iter()
                .enumerate()
                .map(|(i, a)| Observation {
                    subject: AnomalySubject::Sale {
                        sale_id: SaleId::new(i as i64 + 1),
                    },
                    amount: *a,
                })
                .collect(),
        })
    }

    #[test]
    fn only_the_outlier_sale_is_emitted() {
        let mut amounts = vec![10.0; 10];
        amounts.push(1000.0);
        let out = sales(&amounts).run().unwrap();

        assert_eq!(out.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.subject, AnomalySubject::Sale { sale_id: SaleId::new(11) });
        assert_eq!(r.level, AnomalyLevel::Alert);
        assert_eq!(r.policy_code, "ZSCORE_IFOREST");
        assert!(r.score >= 0.0);
    }

    #[test]
    fn flat_series_reports_no_anomalies() {
        let out = sales(&[4.0; 20]).run().unwrap();
        assert!(out.is_empty());
        assert_eq!(out.explanation.as_deref(), Some("No anomalies found."));
    }

    #[test]
    fn no_observations_is_an_empty_success() {
        let out = sales(&[]).run().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn daily_subjects_key_by_warehouse_and_date() {
        let mut observations: Vec<Observation> = (1..=12)
            .map(|day| Observation {
                subject: AnomalySubject::Day {
                    warehouse_id: WarehouseId::new(5),
                    date: d(day),
                },
                amount: 50.0,
            })
            .collect();
        observations[6].amount = 5000.0;
        let job = SalesAnomalyJob::new(AnomalyInput {
            company_id: CompanyId::new(1),
            warehouse_id: WarehouseId::new(5),
            observations,
        });

        let a = job.run().unwrap();
        let b = job.run().unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(a.len(), 1);
        assert_eq!(
            a.records[0].natural_key().1,
            AnomalySubject::Day {
                warehouse_id: WarehouseId::new(5),
                date: d(7)
            }
        );
    }

    #[test]
    fn non_finite_amounts_are_rejected() {
        match sales(&[1.0, f64::NAN]).run() {
            Err(AiError::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }
}
