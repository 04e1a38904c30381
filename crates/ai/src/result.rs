use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use insight_core::DomainError;

/// Output of one engine run: the natural-keyed records it produced.
///
/// An empty `records` list is a successful "insufficient data" outcome, not a
/// failure; `explanation` then says why nothing was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResult<T> {
    pub records: Vec<T>,

    /// Optional human-readable explanation.
    pub explanation: Option<String>,

    /// Free-form run metadata (counts of skipped keys, cache outcomes, ...).
    pub metadata: JsonValue,
}

impl<T> AiResult<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            explanation: None,
            metadata: JsonValue::Null,
        }
    }

    /// Empty result carrying the reason nothing was produced.
    pub fn insufficient(explanation: impl Into<String>) -> Self {
        Self::new(Vec::new()).with_explanation(explanation)
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("scope violation: {0}")]
    ScopeViolation(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AiError {
    fn from(e: DomainError) -> Self {
        AiError::InvalidInput(e.to_string())
    }
}
