//! Provider configuration from TOML (`[providers]` section)

use serde::{Deserialize, Serialize};

/// OpenAI-compatible API provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key. Prefer `api_key_env`.
    pub api_key: Option<String>,
    /// Base URL for the API; `/v1/chat/completions` is appended.
    pub base_url: String,
    /// Events buffered between the HTTP reader and the turn.
    pub stream_buffer: usize,
    /// Timeout for establishing the response, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            stream_buffer: 64,
            request_timeout_secs: 60,
        }
    }
}

impl FileOpenAiConfig {
    /// Resolve the API key: the inline key wins, then the named env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    /// OpenAI-compatible API settings.
    pub openai: FileOpenAiConfig,
}
