//! Console formatting for turn results

use chatstream_application::{ChatCompletionError, ErrorKind};
use colored::Colorize;

/// Formats turn outcomes for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One-line description of a failed turn, with a hint when it is worth retrying.
    pub fn format_error(error: &ChatCompletionError) -> String {
        if error.is_cancelled() {
            return "Cancelled.".yellow().to_string();
        }

        let mut output = format!("{} {}", "Error:".red().bold(), error);
        match error.kind() {
            ErrorKind::Commit => output.push_str(&format!(
                "\n{}",
                "The reply was generated but not saved; the chat is unchanged.".dimmed()
            )),
            _ if error.is_retryable() => {
                output.push_str(&format!("\n{}", "Retrying the message may succeed.".dimmed()))
            }
            _ => {}
        }
        output
    }

    /// Trailer printed after a reply so the chat can be continued.
    pub fn format_chat_footer(chat_id: &str) -> String {
        format!("{} {}", "chat:".dimmed(), chat_id.cyan())
    }
}
