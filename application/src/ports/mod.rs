//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod chat_store;
pub mod completion_provider;
pub mod conversation_logger;
pub mod stream_sink;
