//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Raised while constructing or mutating conversation entities. Each variant
/// maps to one error kind the use-case layer reports to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Token budget exceeded: message needs {required} tokens, {available} available")]
    BudgetExceeded { required: usize, available: usize },
}

impl DomainError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Check if this error represents a token budget overflow
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, DomainError::BudgetExceeded { .. })
    }
}
