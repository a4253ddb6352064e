//! Stream sink port
//!
//! The output side of a streamed turn: every received delta produces one
//! cumulative [`ChatCompletionOutput`] snapshot published here, in arrival
//! order. The sink is owned by the caller, which decides its buffering and
//! closes it; the use case only publishes.

use crate::use_cases::chat_completion_stream::ChatCompletionOutput;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while publishing to a sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Stream sink closed")]
    Closed,
}

/// Ordered output channel for partial completions
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Publish one snapshot, waiting for capacity if the sink is bounded
    async fn publish(&self, output: ChatCompletionOutput) -> Result<(), SinkError>;
}

/// Bounded channel: a full buffer suspends the publisher.
#[async_trait]
impl StreamSink for mpsc::Sender<ChatCompletionOutput> {
    async fn publish(&self, output: ChatCompletionOutput) -> Result<(), SinkError> {
        self.send(output).await.map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl StreamSink for mpsc::UnboundedSender<ChatCompletionOutput> {
    async fn publish(&self, output: ChatCompletionOutput) -> Result<(), SinkError> {
        self.send(output).map_err(|_| SinkError::Closed)
    }
}

/// Sink that discards every snapshot (for callers that only want the result).
pub struct NoStreamSink;

#[async_trait]
impl StreamSink for NoStreamSink {
    async fn publish(&self, _output: ChatCompletionOutput) -> Result<(), SinkError> {
        Ok(())
    }
}
