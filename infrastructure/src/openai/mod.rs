//! OpenAI-compatible completion provider
//!
//! Speaks the streamed chat completions protocol used by OpenAI and the
//! many servers that mirror it.

mod protocol;
mod provider;
mod sse;

pub use provider::{OpenAiCompletionProvider, OpenAiSetupError};
pub use sse::SseDecoder;
