//! Combinator over independent detectors.

use serde::{Deserialize, Serialize};

use crate::anomaly::detector::AnomalyDetector;
use crate::anomaly::isolation::IsolationDetector;
use crate::anomaly::zscore::ZScoreDetector;

/// Policy code persisted with every record produced by the standard ensemble.
pub const POLICY_CODE: &str = "ZSCORE_IFOREST";

const FALLBACK_REASON: &str = "flagged, no specific cause";

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyLevel {
    Info,
    Warn,
    Alert,
}

impl AnomalyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyLevel::Info => "INFO",
            AnomalyLevel::Warn => "WARN",
            AnomalyLevel::Alert => "ALERT",
        }
    }
}

/// Tuning for the standard z-score + isolation forest ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub z_threshold: f64,
    /// Combined severity strictly above this is an ALERT.
    pub alert_severity: f64,
    /// The isolation forest is only fit on series with at least this many points.
    pub min_outlier_points: usize,
    pub trees: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            alert_severity: 4.0,
            min_outlier_points: 11,
            trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Combined decision for one point.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleVerdict {
    pub flagged: bool,
    pub severity: f64,
    pub level: AnomalyLevel,
    pub reason: String,
}

/// A point is anomalous if any detector flags it; severity is the sum of
/// every detector's contribution.
pub struct Ensemble {
    detectors: Vec<Box<dyn AnomalyDetector>>,
    alert_severity: f64,
}

impl Ensemble {
    pub fn new(alert_severity: f64) -> Self {
        Self {
            detectors: Vec::new(),
            alert_severity,
        }
    }

    pub fn with_detector(mut self, detector: impl AnomalyDetector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    /// Z-score plus isolation forest.
    pub fn standard(config: &AnomalyConfig) -> Self {
        Self::new(config.alert_severity)
            .with_detector(ZScoreDetector::new(config.z_threshold))
            .with_detector(IsolationDetector::new(
                config.trees,
                config.max_samples,
                config.min_outlier_points,
                config.seed,
            ))
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn evaluate(&self, values: &[f64]) -> Vec<EnsembleVerdict> {
        let per_detector: Vec<_> = self.detectors.iter().map(|d| d.evaluate(values)).collect();

        (0..values.len())
            .map(|i| {
                let mut flagged = false;
                let mut severity = 0.0;
                let mut reasons: Vec<&str> = Vec::new();
                for signals in &per_detector {
                    let Some(signal) = signals.get(i) else {
                        continue;
                    };
                    severity += signal.severity;
                    if signal.flagged {
                        flagged = true;
                        if let Some(r) = signal.reason.as_deref() {
                            reasons.push(r);
                        }
                    }
                }

                let level = if !flagged {
                    AnomalyLevel::Info
                } else if severity > self.alert_severity {
                    AnomalyLevel::Alert
                } else {
                    AnomalyLevel::Warn
                };

                let reason = match (flagged, reasons.is_empty()) {
                    (false, _) => String::new(),
                    (true, true) => FALLBACK_REASON.to_string(),
                    (true, false) => format!(
                        "{}; severity {severity:.2} ({})",
                        reasons.join("; "),
                        level.as_str()
                    ),
                };

                EnsembleVerdict {
                    flagged,
                    severity,
                    level,
                    reason,
                }
            })
            .collect()
    }
}
