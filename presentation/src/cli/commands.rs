//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for chatstream
#[derive(Parser, Debug)]
#[command(name = "chatstream")]
#[command(author, version, about = "Streaming chat completions with persistent conversations")]
#[command(long_about = r#"
chatstream sends a message to a chat completion model and prints the reply
as it streams in. Conversations are stored by chat id, so later turns on the
same id continue where the last one stopped.

Configuration files are loaded from (in priority order):
1. --config <path>          Explicit config file
2. ./chatstream.toml        Project-level config
3. ~/.config/chatstream/config.toml   Global config
4. CHATSTREAM_* environment variables (e.g. CHATSTREAM_CHAT__MODEL)

Example:
  chatstream "Explain ownership in one paragraph"
  chatstream --chat-id rust-notes "And borrowing?"
  chatstream --chat --chat-id rust-notes
"#)]
pub struct Cli {
    /// The message to send (not required in chat mode)
    pub message: Option<String>,

    /// Chat to continue; a new id is generated when omitted
    #[arg(long, value_name = "ID", default_value = "")]
    pub chat_id: String,

    /// User the chat belongs to
    #[arg(long, value_name = "ID", default_value = "local")]
    pub user_id: String,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print only the reply, without the trailing chat id
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
