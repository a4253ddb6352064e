//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL conversation log; disabled when unset
    pub conversation_log: Option<String>,
    /// Directory for the rolling diagnostic log; stderr only when unset
    pub log_dir: Option<String>,
}
