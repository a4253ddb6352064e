//! Configuration file loading for chatstream
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./chatstream.toml` or `./.chatstream.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/chatstream/config.toml`
//! 4. `CHATSTREAM_*` environment variables
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileChatConfig, FileConfig, FileLoggingConfig, FileOpenAiConfig,
    FileProvidersConfig, FileReplConfig, FileStorageBackend, FileStorageConfig,
};
pub use loader::ConfigLoader;
