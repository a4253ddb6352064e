//! Chat store adapters
//!
//! Implementations of the [`ChatStore`](chatstream_application::ChatStore)
//! port: an in-process map and a directory of JSON files.

mod file;
mod memory;

pub use file::FileChatStore;
pub use memory::InMemoryChatStore;
