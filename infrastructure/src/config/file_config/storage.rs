//! Storage configuration from TOML (`[storage]` section)

use serde::{Deserialize, Serialize};

/// Where chats are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStorageBackend {
    /// Process memory; chats are lost on exit
    Memory,
    /// One JSON file per chat under `path`
    #[default]
    File,
}

/// Raw storage configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub backend: FileStorageBackend,
    /// Directory for the file backend. Defaults to the user data dir.
    pub path: Option<String>,
}

impl FileStorageConfig {
    /// Directory used by the file backend.
    pub fn resolved_path(&self) -> Option<std::path::PathBuf> {
        match &self.path {
            Some(path) => Some(std::path::PathBuf::from(path)),
            None => dirs::data_dir().map(|d| d.join("chatstream").join("chats")),
        }
    }
}
