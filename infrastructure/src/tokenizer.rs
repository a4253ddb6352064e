//! BPE token counting for OpenAI models

use chatstream_domain::{DomainError, Model, Tokenizer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// [`Tokenizer`] backed by `tiktoken-rs`.
///
/// Encodings are loaded lazily per model name and cached for the life of
/// the tokenizer. A model without a known encoding is counted by the
/// fallback tokenizer if one is set, and fails with
/// [`DomainError::Tokenization`] otherwise.
#[derive(Default)]
pub struct TiktokenTokenizer {
    encodings: Mutex<HashMap<String, Arc<CoreBPE>>>,
    fallback: Option<Box<dyn Tokenizer>>,
}

impl TiktokenTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count models without a BPE encoding with `fallback` instead.
    pub fn with_fallback(mut self, fallback: impl Tokenizer + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Whether `model_name` has a known encoding.
    pub fn supports(model_name: &str) -> bool {
        tiktoken_rs::tokenizer::get_tokenizer(model_name).is_some()
    }

    fn encoding_for(&self, model: &Model) -> Result<Arc<CoreBPE>, DomainError> {
        let mut encodings = self
            .encodings
            .lock()
            .map_err(|_| DomainError::Tokenization("encoding cache poisoned".to_string()))?;

        if let Some(bpe) = encodings.get(model.as_str()) {
            return Ok(bpe.clone());
        }

        let bpe = tiktoken_rs::get_bpe_from_model(model.as_str()).map_err(|e| {
            DomainError::Tokenization(format!("no encoding for model {}: {}", model, e))
        })?;
        debug!(model = %model, "Loaded BPE encoding");
        let bpe = Arc::new(bpe);
        encodings.insert(model.as_str().to_string(), bpe.clone());
        Ok(bpe)
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, model: &Model, text: &str) -> Result<usize, DomainError> {
        match (self.encoding_for(model), &self.fallback) {
            (Ok(bpe), _) => Ok(bpe.encode_with_special_tokens(text).len()),
            (Err(_), Some(fallback)) => fallback.count_tokens(model, text),
            (Err(e), None) => Err(e),
        }
    }
}
