//! OpenAI-compatible streaming completion provider
//!
//! Opens a `stream: true` chat completion and hands the body to a
//! background task that decodes SSE payloads into [`StreamEvent`]s on the
//! [`StreamHandle`] channel. The channel is bounded, so a slow consumer
//! stops the task from reading further and TCP flow control pushes back on
//! the server.

use super::protocol::{ApiErrorResponse, ChatCompletionBody, SsePayload, parse_payload};
use super::sse::SseDecoder;
use crate::config::FileOpenAiConfig;
use async_trait::async_trait;
use chatstream_application::ports::completion_provider::{
    CompletionProvider, CompletionRequest, ProviderError, StreamHandle,
};
use chatstream_domain::StreamEvent;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use std::ops::ControlFlow;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Errors building the provider from configuration
#[derive(Error, Debug)]
pub enum OpenAiSetupError {
    #[error("No API key: set {0} or providers.openai.api_key")]
    MissingApiKey(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Streams chat completions from an OpenAI-compatible endpoint.
pub struct OpenAiCompletionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    stream_buffer: usize,
    request_timeout: Duration,
}

impl OpenAiCompletionProvider {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        stream_buffer: usize,
        request_timeout: Duration,
    ) -> Result<Self, OpenAiSetupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), COMPLETIONS_PATH),
            api_key: api_key.into(),
            stream_buffer: stream_buffer.max(1),
            request_timeout,
        })
    }

    /// Build from the `[providers.openai]` section.
    pub fn from_config(config: &FileOpenAiConfig) -> Result<Self, OpenAiSetupError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| OpenAiSetupError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            &config.base_url,
            api_key,
            config.stream_buffer,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<StreamHandle, ProviderError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "Sending streaming completion request"
        );

        let send = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionBody::from(request))
            .send();

        // Only the response head is bounded; a long reply may stream for longer
        let response = tokio::time::timeout(self.request_timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout)?
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion request rejected with {}", status);
            return Err(status_error(status, &body));
        }

        let (tx, handle) = StreamHandle::channel(self.stream_buffer);
        tokio::spawn(pump_events(response.bytes_stream(), tx));
        Ok(handle)
    }
}

fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::ConnectionError(e.to_string())
    } else {
        ProviderError::RequestFailed(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(message),
        _ => ProviderError::RequestFailed(format!("HTTP {}: {}", status, message)),
    }
}

/// Read the response body until `[DONE]`, forwarding each delta.
///
/// Returns early when the receiver is gone. A body that ends without a
/// terminator closes the channel, which the handle reports as
/// [`ProviderError::TransportClosed`], unless a chunk already carried a
/// `finish_reason`.
async fn pump_events<S, B, E>(body: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = SseDecoder::new();
    let mut finished = false;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(format!("stream read failed: {}", e))).await;
                return;
            }
        };
        for payload in decoder.push(chunk.as_ref()) {
            if forward(&payload, &tx, &mut finished).await.is_break() {
                return;
            }
        }
    }

    if let Some(payload) = decoder.finish()
        && forward(&payload, &tx, &mut finished).await.is_break()
    {
        return;
    }
    if finished {
        let _ = tx.send(StreamEvent::Completed).await;
    } else {
        debug!("Completion body ended without a terminator");
    }
}

async fn forward(
    payload: &str,
    tx: &mpsc::Sender<StreamEvent>,
    finished: &mut bool,
) -> ControlFlow<()> {
    match parse_payload(payload) {
        Ok(SsePayload::Done) => {
            let _ = tx.send(StreamEvent::Completed).await;
            ControlFlow::Break(())
        }
        Ok(SsePayload::Chunk { content, finished: last }) => {
            *finished |= last;
            match content {
                Some(text) => {
                    if tx.send(StreamEvent::Delta(text)).await.is_err() {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                }
                None => ControlFlow::Continue(()),
            }
        }
        Err(e) => {
            let _ = tx.send(StreamEvent::Error(e)).await;
            ControlFlow::Break(())
        }
    }
}
