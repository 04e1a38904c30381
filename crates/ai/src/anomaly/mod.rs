//! Statistical anomaly ensemble over scalar series (per sale or per day).

pub mod detector;
pub mod ensemble;
pub mod isolation;
pub mod job;
pub mod zscore;

pub use detector::{AnomalyDetector, DetectorSignal};
pub use ensemble::{AnomalyConfig, AnomalyLevel, Ensemble, EnsembleVerdict, POLICY_CODE};
pub use isolation::IsolationDetector;
pub use job::{AnomalyInput, AnomalyRecord, AnomalySubject, Observation, SalesAnomalyJob};
pub use zscore::ZScoreDetector;
