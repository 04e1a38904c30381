/// Per-point output of one detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSignal {
    pub flagged: bool,
    /// Non-negative contribution to the combined severity.
    pub severity: f64,
    /// Why the point was flagged; `None` when not flagged.
    pub reason: Option<String>,
}

impl DetectorSignal {
    /// Contributes `severity` but never flags.
    pub fn quiet(severity: f64) -> Self {
        Self {
            flagged: false,
            severity,
            reason: None,
        }
    }
}

/// A single outlier signal over a series of scalar amounts.
///
/// `evaluate` returns exactly one signal per input value, in input order.
pub trait AnomalyDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, values: &[f64]) -> Vec<DetectorSignal>;
}
