//! Completion provider port
//!
//! Defines the interface for opening server-streamed chat completions.

use async_trait::async_trait;
use chatstream_domain::{Chat, Role, StreamEvent};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during completion provider operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Transport closed before end of stream")]
    TransportClosed,
}

/// One history entry as sent to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// A streamed completion request built from a chat
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub n: u32,
    pub stop: Vec<String>,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl CompletionRequest {
    /// Translate the chat's live history and generation parameters.
    pub fn from_chat(chat: &Chat) -> Self {
        let config = chat.config();
        Self {
            model: config.model.as_str().to_string(),
            messages: chat
                .messages()
                .iter()
                .map(|m| PromptMessage {
                    role: m.role(),
                    content: m.content().to_string(),
                })
                .collect(),
            temperature: config.temperature,
            top_p: config.top_p,
            n: config.n,
            stop: config.stop.clone(),
            max_tokens: config.max_tokens,
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
        }
    }
}

/// Handle for receiving streaming events from a provider.
///
/// Wraps a bounded `mpsc::Receiver<StreamEvent>`: the transport task blocks
/// once the buffer is full, so a slow reader throttles the remote stream.
/// Dropping the handle stops the transport task at its next send.
pub struct StreamHandle {
    receiver: mpsc::Receiver<StreamEvent>,
    finished: bool,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            receiver,
            finished: false,
        }
    }

    /// Create a handle plus the sender a transport task writes into.
    pub fn channel(buffer: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }

    /// Receive the next text fragment.
    ///
    /// Returns `Ok(None)` once the provider signalled end of stream. A
    /// channel that closes without that signal is
    /// [`ProviderError::TransportClosed`].
    pub async fn recv(&mut self) -> Result<Option<String>, ProviderError> {
        if self.finished {
            return Ok(None);
        }
        match self.receiver.recv().await {
            Some(StreamEvent::Delta(text)) => Ok(Some(text)),
            Some(StreamEvent::Completed) => {
                self.finished = true;
                Ok(None)
            }
            Some(StreamEvent::Error(e)) => {
                self.finished = true;
                Err(ProviderError::StreamError(e))
            }
            None => {
                self.finished = true;
                Err(ProviderError::TransportClosed)
            }
        }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, ProviderError> {
        let mut full_text = String::new();
        while let Some(chunk) = self.recv().await? {
            full_text.push_str(&chunk);
        }
        Ok(full_text)
    }
}

/// Provider of streamed chat completions
///
/// Implementations (adapters) live in the infrastructure layer and own
/// transport, authentication and wire format.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a completion stream for the given request
    async fn open_stream(&self, request: &CompletionRequest) -> Result<StreamHandle, ProviderError>;
}
