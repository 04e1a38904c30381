//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic input failures (validation, scope,
/// invariants). Storage and engine failures have their own error types in the
/// crates that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. negative lead time).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required scope identifier was absent (e.g. `company_id`).
    #[error("missing required scope: {0}")]
    MissingScope(String),

    /// An identifier was invalid (e.g. parse failure, non-positive value).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_scope(msg: impl Into<String>) -> Self {
        Self::MissingScope(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// True when the error was caused by the caller's input (maps to HTTP 400).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_) | DomainError::MissingScope(_) | DomainError::InvalidId(_)
        )
    }
}
