//! REPL (Read-Eval-Print Loop) for interactive chat

use super::turn::stream_turn_to_stdout;
use crate::output::console::ConsoleFormatter;
use chatstream_application::{
    ChatCompletionConfigInput, ChatCompletionInput, ChatCompletionStreamUseCase,
};
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::path::PathBuf;
use tracing::warn;

const HISTORY_CAPACITY: usize = 1000;

/// Slash commands understood by the REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    /// Show the current chat id
    ShowChat,
    /// Start a fresh chat on the next message
    NewChat,
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line starting with `/`; other lines are messages.
    pub fn parse(line: &str) -> Option<Self> {
        let cmd = line.trim().strip_prefix('/')?;
        Some(match cmd {
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "help" | "h" | "?" => ReplCommand::Help,
            "chat" => ReplCommand::ShowChat,
            "new" => ReplCommand::NewChat,
            other => ReplCommand::Unknown(other.to_string()),
        })
    }
}

/// Interactive chat REPL
///
/// Every line is one turn on the same chat. Without an explicit chat id the
/// first turn creates a chat and the REPL keeps using its id.
pub struct ChatRepl {
    use_case: ChatCompletionStreamUseCase,
    user_id: String,
    chat_id: String,
    config: ChatCompletionConfigInput,
    history_file: Option<PathBuf>,
    sink_buffer: usize,
}

impl ChatRepl {
    pub fn new(
        use_case: ChatCompletionStreamUseCase,
        user_id: impl Into<String>,
        config: ChatCompletionConfigInput,
    ) -> Self {
        Self {
            use_case,
            user_id: user_id.into(),
            chat_id: String::new(),
            config,
            history_file: dirs::data_dir().map(|p| p.join("chatstream").join("history.txt")),
            sink_buffer: 32,
        }
    }

    /// Continue an existing chat
    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = chat_id.into();
        self
    }

    /// Set the history file (`None` keeps history in memory only)
    pub fn with_history_file(mut self, path: Option<PathBuf>) -> Self {
        self.history_file = path;
        self
    }

    /// Snapshots buffered between the turn and the terminal
    pub fn with_sink_buffer(mut self, buffer: usize) -> Self {
        self.sink_buffer = buffer;
        self
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut line_editor = self.line_editor();
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic("chatstream".to_string()),
            DefaultPromptSegment::Empty,
        );

        self.print_welcome();

        loop {
            match line_editor.read_line(&prompt)? {
                Signal::Success(buffer) => {
                    let line = buffer.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if let Some(command) = ReplCommand::parse(line) {
                        if self.handle_command(command) {
                            break;
                        }
                        continue;
                    }

                    self.process_message(line).await;
                }
                Signal::CtrlC => {
                    println!("^C");
                    continue;
                }
                Signal::CtrlD => {
                    println!("Bye!");
                    break;
                }
                #[allow(unreachable_patterns)]
                _ => continue,
            }
        }

        Ok(())
    }

    fn line_editor(&self) -> Reedline {
        let line_editor = Reedline::create();
        let Some(path) = &self.history_file else {
            return line_editor;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match FileBackedHistory::with_file(HISTORY_CAPACITY, path.clone()) {
            Ok(history) => line_editor.with_history(Box::new(history)),
            Err(e) => {
                warn!("History disabled, cannot open {}: {}", path.display(), e);
                line_editor
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("chatstream - {}", self.config.model);
        if !self.chat_id.is_empty() {
            println!("{}", ConsoleFormatter::format_chat_footer(&self.chat_id));
        }
        println!("Type /help for commands, Ctrl-C cancels a reply, Ctrl-D exits.");
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    fn handle_command(&mut self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Quit => {
                println!("Bye!");
                true
            }
            ReplCommand::Help => {
                println!();
                println!("Commands:");
                println!("  /help, /h, /?    - Show this help");
                println!("  /chat            - Show the current chat id");
                println!("  /new             - Start a new chat");
                println!("  /quit, /exit, /q - Exit chat");
                println!();
                false
            }
            ReplCommand::ShowChat => {
                if self.chat_id.is_empty() {
                    println!("No chat yet; the next message starts one.");
                } else {
                    println!("{}", ConsoleFormatter::format_chat_footer(&self.chat_id));
                }
                false
            }
            ReplCommand::NewChat => {
                self.chat_id.clear();
                println!("The next message starts a new chat.");
                false
            }
            ReplCommand::Unknown(cmd) => {
                println!("Unknown command: /{}", cmd);
                println!("Type /help for available commands");
                false
            }
        }
    }

    async fn process_message(&mut self, message: &str) {
        let input = ChatCompletionInput {
            chat_id: self.chat_id.clone(),
            user_id: self.user_id.clone(),
            user_message: message.to_string(),
            config: self.config.clone(),
        };

        match stream_turn_to_stdout(&self.use_case, input, self.sink_buffer).await {
            Ok(output) => self.chat_id = output.chat_id,
            Err(e) => eprintln!("{}", ConsoleFormatter::format_error(&e)),
        }
        println!();
    }
}
