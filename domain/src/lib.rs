//! Domain layer for chatstream
//!
//! This crate contains the conversation entities and their invariants.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! - **Chat**: the aggregate root, a config plus an ordered message history
//!   opened by a system message
//! - **Message**: one turn, with a token count fixed at creation
//! - **Model**: provider model name and its context-token budget

pub mod chat;
pub mod core;

// Re-export commonly used types
pub use chat::{
    config::ChatConfig,
    entities::{Chat, ChatStatus},
    message::{Message, Role},
    stream::StreamEvent,
};
pub use crate::core::{
    error::DomainError,
    model::Model,
    tokenizer::{ApproximateTokenizer, Tokenizer},
};
