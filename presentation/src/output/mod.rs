//! Terminal output: streamed replies and turn summaries

pub mod console;
pub mod stream_printer;
