use crate::anomaly::detector::{AnomalyDetector, DetectorSignal};
use crate::stats::{mean, std_population};

/// Flags points whose population z-score exceeds a threshold.
///
/// Severity is |z|. A series with zero spread produces no flags and zero
/// severity.
#[derive(Debug, Clone, Copy)]
pub struct ZScoreDetector {
    threshold: f64,
}

impl ZScoreDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl AnomalyDetector for ZScoreDetector {
    fn name(&self) -> &'static str {
        "zscore"
    }

    fn evaluate(&self, values: &[f64]) -> Vec<DetectorSignal> {
        let m = mean(values);
        let std = std_population(values);
        if std <= f64::EPSILON {
            return values.iter().map(|_| DetectorSignal::quiet(0.0)).collect();
        }

        values
            .iter()
            .map(|x| {
                let z = (x - m) / std;
                let az = z.abs();
                if az > self.threshold {
                    DetectorSignal {
                        flagged: true,
                        severity: az,
                        reason: Some(format!("z-score {z:.2} beyond ±{:.1}", self.threshold)),
                    }
                } else {
                    DetectorSignal::quiet(az)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_never_flag() {
        let signals = ZScoreDetector::default().evaluate(&[5.0; 20]);
        assert_eq!(signals.len(), 20);
        assert!(signals.iter().all(|s| !s.flagged && s.severity == 0.0));
    }

    #[test]
    fn extreme_point_is_flagged_with_its_z() {
        let mut values = vec![1.0; 10];
        values.push(100.0);
        let signals = ZScoreDetector::default().evaluate(&values);
        assert!(signals[10].flagged);
        assert!((signals[10].severity - 10f64.sqrt()).abs() < 1e-9);
        assert!(signals[..10].iter().all(|s| !s.flagged));
    }
}
