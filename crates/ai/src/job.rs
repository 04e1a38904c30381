use insight_core::CompanyId;

use crate::result::{AiError, AiResult};

/// A company-scoped engine computation.
///
/// This crate stays storage-agnostic: inputs are aggregated and handed in by
/// callers (infra pipelines), and outputs are returned rather than persisted.
pub trait AiJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output: Send + 'static;

    /// The company this job computes for.
    fn company_id(&self) -> CompanyId;

    /// The input snapshot the job runs on.
    fn input(&self) -> &Self::Input;

    /// Execute the computation.
    ///
    /// Must be deterministic for identical inputs (the forecast cache aside).
    fn run(&self) -> Result<AiResult<Self::Output>, AiError>;
}
