//! Interactive chat module
//!
//! Provides a reedline-based multi-turn chat and the single-turn driver it
//! shares with one-shot mode.

mod repl;
mod turn;

pub use repl::{ChatRepl, ReplCommand};
pub use turn::stream_turn_to_stdout;
