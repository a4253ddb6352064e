//! Wire types for the OpenAI chat completions API
//!
//! Only choice `0` is read from a chunk; other choices requested with
//! `n > 1` are ignored so their text never mixes into the reply. Chunks
//! with empty content (the leading role-only chunk, the final
//! `finish_reason` chunk) yield no delta, so every delta carries text and
//! each one produces a distinct cumulative snapshot downstream.

use chatstream_application::ports::completion_provider::{CompletionRequest, PromptMessage};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/chat/completions` with streaming enabled.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionBody<'a> {
    pub model: &'a str,
    pub messages: &'a [PromptMessage],
    pub temperature: f32,
    pub top_p: f32,
    pub n: u32,
    #[serde(skip_serializing_if = "is_empty")]
    pub stop: &'a [String],
    #[serde(skip_serializing_if = "is_zero")]
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub stream: bool,
}

fn is_empty(stop: &&[String]) -> bool {
    stop.is_empty()
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl<'a> From<&'a CompletionRequest> for ChatCompletionBody<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            n: request.n,
            stop: &request.stop,
            max_tokens: request.max_tokens,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
            stream: true,
        }
    }
}

/// One `data:` payload of a streamed response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub message: String,
}

/// Error document returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiError,
}

/// What a single payload means for the stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SsePayload {
    /// `[DONE]` terminator
    Done,
    /// A chunk, carrying text for choice `0` if any
    Chunk {
        content: Option<String>,
        finished: bool,
    },
}

pub(crate) fn parse_payload(payload: &str) -> Result<SsePayload, String> {
    if payload.trim() == "[DONE]" {
        return Ok(SsePayload::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| format!("malformed stream chunk: {}", e))?;
    if let Some(error) = chunk.error {
        return Err(error.message);
    }

    let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) else {
        return Ok(SsePayload::Chunk {
            content: None,
            finished: false,
        });
    };
    Ok(SsePayload::Chunk {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        finished: choice.finish_reason.is_some(),
    })
}
