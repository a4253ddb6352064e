//! Conversation domain.
//!
//! - [`entities::Chat`]: the conversation aggregate
//! - [`message::Message`]: a single turn within a chat
//! - [`config::ChatConfig`]: generation parameters bound to a chat
//! - [`stream::StreamEvent`]: items of a streamed completion

pub mod config;
pub mod entities;
pub mod message;
pub mod stream;
