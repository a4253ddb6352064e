//! CLI entrypoint for chatstream
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use chatstream_application::{
    ChatCompletionInput, ChatCompletionStreamUseCase, ChatStore, ConversationLogger,
};
use chatstream_domain::{ApproximateTokenizer, Tokenizer};
use chatstream_infrastructure::{
    ConfigLoader, FileChatStore, FileConfig, FileStorageBackend, InMemoryChatStore,
    JsonlConversationLogger, OpenAiCompletionProvider, TiktokenTokenizer,
};
use chatstream_presentation::{ChatRepl, Cli, ConsoleFormatter, stream_turn_to_stdout};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const SINK_BUFFER: usize = 32;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(ExitCode::SUCCESS);
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };

    let _log_guard = init_logging(cli.verbose, config.logging.log_dir.as_deref());
    config.validate().context("Invalid configuration")?;

    info!("Starting chatstream");

    // === Dependency Injection ===
    let use_case = build_use_case(&config)?;
    let chat_config = config.chat.to_config_input();

    // Chat mode
    if cli.chat {
        let mut repl = ChatRepl::new(use_case, cli.user_id, chat_config)
            .with_chat_id(cli.chat_id)
            .with_sink_buffer(SINK_BUFFER);
        if let Some(path) = &config.repl.history_file {
            repl = repl.with_history_file(Some(expand_home(path)));
        }

        repl.run().await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Single message mode - message is required
    let Some(message) = cli.message else {
        bail!("A message is required. Use --chat for interactive mode.");
    };

    let input = ChatCompletionInput {
        chat_id: cli.chat_id,
        user_id: cli.user_id,
        user_message: message,
        config: chat_config,
    };

    match stream_turn_to_stdout(&use_case, input, SINK_BUFFER).await {
        Ok(output) => {
            if !cli.quiet {
                eprintln!("{}", ConsoleFormatter::format_chat_footer(&output.chat_id));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", ConsoleFormatter::format_error(&e));
            // 130 mirrors the shell convention for SIGINT
            Ok(if e.is_cancelled() {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Install the tracing subscriber.
///
/// Diagnostics go to stderr so they never interleave with the streamed
/// reply on stdout. With `log_dir` set, a daily rolling file gets the same
/// events; the returned guard flushes it on drop.
fn init_logging(verbose: u8, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(expand_home(dir), "chatstream.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn build_use_case(config: &FileConfig) -> Result<ChatCompletionStreamUseCase> {
    let store: Arc<dyn ChatStore> = match config.storage.backend {
        FileStorageBackend::Memory => Arc::new(InMemoryChatStore::new()),
        FileStorageBackend::File => {
            let path = config
                .storage
                .resolved_path()
                .context("No data directory available; set storage.path")?;
            info!("Storing chats in {}", path.display());
            Arc::new(FileChatStore::new(expand_home(&path.to_string_lossy())))
        }
    };

    let provider = Arc::new(
        OpenAiCompletionProvider::from_config(&config.providers.openai)
            .context("Failed to set up the completion provider")?,
    );

    if !TiktokenTokenizer::supports(&config.chat.model) {
        warn!(
            "No BPE encoding for model {}; using approximate token counts",
            config.chat.model
        );
    }
    let tokenizer: Arc<dyn Tokenizer> =
        Arc::new(TiktokenTokenizer::new().with_fallback(ApproximateTokenizer));

    let mut use_case = ChatCompletionStreamUseCase::new(store, provider, tokenizer);

    if let Some(path) = &config.logging.conversation_log {
        let path = expand_home(path);
        match JsonlConversationLogger::open(&path) {
            Ok(logger) => {
                info!("Conversation log: {}", logger.path().display());
                let logger: Arc<dyn ConversationLogger> = Arc::new(logger);
                use_case = use_case.with_conversation_logger(logger);
            }
            Err(e) => warn!("Conversation log disabled, cannot open {}: {}", path.display(), e),
        }
    }

    Ok(use_case)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
