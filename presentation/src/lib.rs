//! Presentation layer for chatstream
//!
//! This crate contains CLI definitions, streamed output rendering,
//! and the interactive chat interface.

pub mod chat;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use chat::{ChatRepl, ReplCommand, stream_turn_to_stdout};
pub use cli::commands::Cli;
pub use output::console::ConsoleFormatter;
pub use output::stream_printer::{StreamPrinter, spawn_stdout_printer};
