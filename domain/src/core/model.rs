//! Model value object representing an LLM model

use serde::{Deserialize, Serialize};

/// Provider model bound to a conversation (Value Object)
///
/// Pairs the provider's model name with the context budget the
/// conversation history must fit in. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    name: String,
    max_tokens: usize,
}

impl Model {
    pub fn new(name: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            name: name.into(),
            max_tokens,
        }
    }

    /// Get the provider identifier for this model
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Maximum number of context tokens a conversation may hold
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
