//! Token counting
//!
//! A [`Message`](crate::Message) records its token count at creation time,
//! measured against the [`Model`] active at that moment. The counting
//! strategy is pluggable so adapters can bring a model-specific BPE.

use super::error::DomainError;
use super::model::Model;

/// Counts the tokens a piece of text occupies under a model's encoding.
pub trait Tokenizer: Send + Sync {
    /// Count tokens in `text` for `model`.
    ///
    /// Fails with [`DomainError::Tokenization`] when the text cannot be
    /// encoded for the model.
    fn count_tokens(&self, model: &Model, text: &str) -> Result<usize, DomainError>;
}

/// Approximate tokenizer using character-based estimation
///
/// Roughly one token per four bytes, rounded up. Works for any model and
/// never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateTokenizer;

impl Tokenizer for ApproximateTokenizer {
    fn count_tokens(&self, _model: &Model, text: &str) -> Result<usize, DomainError> {
        Ok(text.len().div_ceil(4))
    }
}
