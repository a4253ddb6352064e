//! Chat Completion Stream use case.
//!
//! Processes one conversation turn end to end:
//!
//! ```text
//! Loading ──NotFound──▶ Creating ─┐
//!    │                            ▼
//!    └──────────────────────▶ Appending ─▶ Requesting ─▶ Streaming ─▶ Finalizing ─▶ Done
//! ```
//!
//! Any step can fail the turn. Nothing is persisted after `Creating` until
//! the assistant reply is complete, so a failed turn leaves the stored chat
//! exactly as it was and is safe to retry from the start.

use crate::ports::chat_store::{ChatStore, ChatStoreError};
use crate::ports::completion_provider::{CompletionProvider, CompletionRequest, ProviderError};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::stream_sink::{SinkError, StreamSink};
use crate::use_cases::chat_locks::ChatLocks;
use chatstream_domain::{Chat, ChatConfig, DomainError, Message, Model, Role, Tokenizer};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Step of the turn in which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Loading,
    Creating,
    Appending,
    Requesting,
    Streaming,
    Finalizing,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Loading => "loading chat",
            TurnPhase::Creating => "creating chat",
            TurnPhase::Appending => "appending user message",
            TurnPhase::Requesting => "requesting completion",
            TurnPhase::Streaming => "streaming completion",
            TurnPhase::Finalizing => "finalizing turn",
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a failed turn, for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Tokenization,
    BudgetExceeded,
    /// Store failure before the provider was called
    Store,
    /// Store failure after the reply was generated; nothing was committed
    Commit,
    Provider,
    SinkClosed,
    Cancelled,
}

/// Errors that can occur while processing a turn.
#[derive(Error, Debug)]
pub enum ChatCompletionError {
    #[error("Error {phase}: {source}")]
    Domain {
        phase: TurnPhase,
        #[source]
        source: DomainError,
    },

    #[error("Store error {phase}: {source}")]
    Store {
        phase: TurnPhase,
        #[source]
        source: ChatStoreError,
    },

    #[error("Provider error {phase}: {source}")]
    Provider {
        phase: TurnPhase,
        #[source]
        source: ProviderError,
    },

    #[error("Error {phase}: {source}")]
    Sink {
        phase: TurnPhase,
        #[source]
        source: SinkError,
    },

    #[error("Turn cancelled while {phase}")]
    Cancelled { phase: TurnPhase },
}

impl ChatCompletionError {
    pub fn phase(&self) -> TurnPhase {
        match self {
            ChatCompletionError::Domain { phase, .. }
            | ChatCompletionError::Store { phase, .. }
            | ChatCompletionError::Provider { phase, .. }
            | ChatCompletionError::Sink { phase, .. }
            | ChatCompletionError::Cancelled { phase } => *phase,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatCompletionError::Domain { source, .. } => match source {
                DomainError::Validation(_) => ErrorKind::Validation,
                DomainError::Tokenization(_) => ErrorKind::Tokenization,
                DomainError::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            },
            ChatCompletionError::Store {
                phase: TurnPhase::Finalizing,
                ..
            } => ErrorKind::Commit,
            ChatCompletionError::Store { .. } => ErrorKind::Store,
            ChatCompletionError::Provider { .. } => ErrorKind::Provider,
            ChatCompletionError::Sink { .. } => ErrorKind::SinkClosed,
            ChatCompletionError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether rerunning the whole turn may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Store | ErrorKind::Commit | ErrorKind::Provider
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatCompletionError::Cancelled { .. })
    }
}

/// Parameters used to create a chat on its first turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionConfigInput {
    pub model: String,
    pub model_max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub n: u32,
    pub stop: Vec<String>,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub initial_system_message: String,
}

impl ChatCompletionConfigInput {
    pub fn to_chat_config(&self) -> ChatConfig {
        ChatConfig {
            model: Model::new(self.model.clone(), self.model_max_tokens),
            temperature: self.temperature,
            top_p: self.top_p,
            n: self.n,
            stop: self.stop.clone(),
            max_tokens: self.max_tokens,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            initial_system_message: self.initial_system_message.clone(),
        }
    }
}

/// Input for the [`ChatCompletionStreamUseCase`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionInput {
    /// Chat to continue; empty starts a chat under a generated id.
    pub chat_id: String,
    pub user_id: String,
    pub user_message: String,
    /// Only read when the chat does not exist yet.
    pub config: ChatCompletionConfigInput,
}

/// A turn's result, and the shape of every streamed snapshot.
///
/// While streaming, `content` is the text received so far in this turn;
/// in the final result it is the full reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatCompletionOutput {
    pub chat_id: String,
    pub user_id: String,
    pub content: String,
}

/// Use case for streaming one chat completion turn.
///
/// Turns on the same chat id are serialized through [`ChatLocks`]; the
/// store and provider are called at most once per step, without retries.
pub struct ChatCompletionStreamUseCase {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn CompletionProvider>,
    tokenizer: Arc<dyn Tokenizer>,
    locks: ChatLocks,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl Clone for ChatCompletionStreamUseCase {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            provider: self.provider.clone(),
            tokenizer: self.tokenizer.clone(),
            locks: self.locks.clone(),
            conversation_logger: self.conversation_logger.clone(),
        }
    }
}

impl ChatCompletionStreamUseCase {
    pub fn new(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn CompletionProvider>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            store,
            provider,
            tokenizer,
            locks: ChatLocks::new(),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    /// Share a lock table with other use case instances.
    pub fn with_locks(mut self, locks: ChatLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Run one turn, publishing cumulative snapshots to `sink`.
    ///
    /// The sink is never closed here. Cancelling `cancellation` stops the
    /// turn at its next suspension point and nothing is persisted.
    pub async fn execute(
        &self,
        input: ChatCompletionInput,
        sink: &dyn StreamSink,
        cancellation: &CancellationToken,
    ) -> Result<ChatCompletionOutput, ChatCompletionError> {
        let chat_id = if input.chat_id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            input.chat_id.clone()
        };

        let result = self.run_turn(&chat_id, &input, sink, cancellation).await;

        if let Err(e) = &result {
            warn!(
                chat_id = %chat_id,
                phase = %e.phase(),
                kind = ?e.kind(),
                "Turn failed: {}",
                e
            );
            self.conversation_logger.log(ConversationEvent::new(
                "turn_failed",
                serde_json::json!({
                    "chat_id": chat_id,
                    "phase": e.phase().as_str(),
                    "kind": format!("{:?}", e.kind()),
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                }),
            ));
        }

        result
    }

    async fn run_turn(
        &self,
        chat_id: &str,
        input: &ChatCompletionInput,
        sink: &dyn StreamSink,
        cancellation: &CancellationToken,
    ) -> Result<ChatCompletionOutput, ChatCompletionError> {
        let _guard = until_cancelled(
            cancellation,
            TurnPhase::Loading,
            self.locks.acquire(chat_id),
        )
        .await?;

        let mut chat = self.load_or_create(chat_id, input, cancellation).await?;

        // Appending
        let model = chat.config().model.clone();
        let user_message = Message::new(
            Role::User,
            input.user_message.as_str(),
            &model,
            self.tokenizer.as_ref(),
        )
        .map_err(|source| ChatCompletionError::Domain {
            phase: TurnPhase::Appending,
            source,
        })?;
        chat.add_message(user_message)
            .map_err(|source| ChatCompletionError::Domain {
                phase: TurnPhase::Appending,
                source,
            })?;

        // Requesting
        let request = CompletionRequest::from_chat(&chat);
        debug!(
            chat_id = %chat.id(),
            model = %request.model,
            messages = request.messages.len(),
            tokens = chat.token_usage(),
            "Opening completion stream"
        );
        let mut stream = until_cancelled(
            cancellation,
            TurnPhase::Requesting,
            self.provider.open_stream(&request),
        )
        .await?
        .map_err(|source| ChatCompletionError::Provider {
            phase: TurnPhase::Requesting,
            source,
        })?;

        // Streaming
        let mut full_response = String::new();
        let mut deltas = 0usize;
        loop {
            let next = until_cancelled(cancellation, TurnPhase::Streaming, stream.recv())
                .await?
                .map_err(|source| ChatCompletionError::Provider {
                    phase: TurnPhase::Streaming,
                    source,
                })?;
            let Some(delta) = next else {
                break;
            };

            full_response.push_str(&delta);
            deltas += 1;

            let snapshot = ChatCompletionOutput {
                chat_id: chat.id().to_string(),
                user_id: chat.user_id().to_string(),
                content: full_response.clone(),
            };
            until_cancelled(cancellation, TurnPhase::Streaming, sink.publish(snapshot))
                .await?
                .map_err(|source| ChatCompletionError::Sink {
                    phase: TurnPhase::Streaming,
                    source,
                })?;
        }
        drop(stream);
        debug!(
            chat_id = %chat.id(),
            deltas,
            bytes = full_response.len(),
            "Completion stream finished"
        );

        // Finalizing
        let assistant_message = Message::new(
            Role::Assistant,
            full_response.as_str(),
            &model,
            self.tokenizer.as_ref(),
        )
        .map_err(|source| ChatCompletionError::Domain {
            phase: TurnPhase::Finalizing,
            source,
        })?;
        chat.add_message(assistant_message)
            .map_err(|source| ChatCompletionError::Domain {
                phase: TurnPhase::Finalizing,
                source,
            })?;

        // Writes are not raced against cancellation once started
        check_cancelled(cancellation, TurnPhase::Finalizing)?;
        self.store
            .save_chat(&chat)
            .await
            .map_err(|source| ChatCompletionError::Store {
                phase: TurnPhase::Finalizing,
                source,
            })?;

        info!(
            chat_id = %chat.id(),
            messages = chat.message_count(),
            erased = chat.erased_messages().len(),
            tokens = chat.token_usage(),
            "Turn committed"
        );
        self.conversation_logger.log(ConversationEvent::new(
            "turn_committed",
            serde_json::json!({
                "chat_id": chat.id(),
                "user_id": chat.user_id(),
                "model": model.as_str(),
                "deltas": deltas,
                "user_message": input.user_message,
                "assistant_message": full_response,
                "token_usage": chat.token_usage(),
            }),
        ));

        Ok(ChatCompletionOutput {
            chat_id: chat.id().to_string(),
            user_id: chat.user_id().to_string(),
            content: full_response,
        })
    }

    /// Loading, falling through to Creating when the store has no such chat.
    async fn load_or_create(
        &self,
        chat_id: &str,
        input: &ChatCompletionInput,
        cancellation: &CancellationToken,
    ) -> Result<Chat, ChatCompletionError> {
        let found = until_cancelled(
            cancellation,
            TurnPhase::Loading,
            self.store.find_chat_by_id(chat_id),
        )
        .await?;

        match found {
            Ok(chat) => {
                if chat.user_id() != input.user_id {
                    warn!(
                        chat_id = %chat_id,
                        "Chat belongs to user {}, turn requested by {}",
                        chat.user_id(),
                        input.user_id
                    );
                }
                debug!(
                    chat_id = %chat_id,
                    messages = chat.message_count(),
                    "Loaded existing chat"
                );
                Ok(chat)
            }
            Err(e) if e.is_not_found() => {
                let chat = self
                    .new_chat(chat_id, input)
                    .map_err(|source| ChatCompletionError::Domain {
                        phase: TurnPhase::Creating,
                        source,
                    })?;

                check_cancelled(cancellation, TurnPhase::Creating)?;
                self.store
                    .create_chat(&chat)
                    .await
                    .map_err(|source| ChatCompletionError::Store {
                        phase: TurnPhase::Creating,
                        source,
                    })?;

                info!(chat_id = %chat_id, model = %chat.config().model, "Created chat");
                self.conversation_logger.log(ConversationEvent::new(
                    "chat_created",
                    serde_json::json!({
                        "chat_id": chat.id(),
                        "user_id": chat.user_id(),
                        "model": chat.config().model.as_str(),
                        "model_max_tokens": chat.config().model.max_tokens(),
                    }),
                ));
                Ok(chat)
            }
            Err(source) => Err(ChatCompletionError::Store {
                phase: TurnPhase::Loading,
                source,
            }),
        }
    }

    fn new_chat(&self, chat_id: &str, input: &ChatCompletionInput) -> Result<Chat, DomainError> {
        let config = input.config.to_chat_config();
        config.validate()?;
        let initial_message = Message::new(
            Role::System,
            config.initial_system_message.as_str(),
            &config.model,
            self.tokenizer.as_ref(),
        )?;
        Chat::new(chat_id, input.user_id.as_str(), initial_message, config)
    }
}

/// Race `fut` against cancellation, reporting which phase was interrupted.
async fn until_cancelled<T>(
    cancellation: &CancellationToken,
    phase: TurnPhase,
    fut: impl Future<Output = T>,
) -> Result<T, ChatCompletionError> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(ChatCompletionError::Cancelled { phase }),
        value = fut => Ok(value),
    }
}

/// Gate in front of store writes, which are never abandoned halfway.
fn check_cancelled(
    cancellation: &CancellationToken,
    phase: TurnPhase,
) -> Result<(), ChatCompletionError> {
    if cancellation.is_cancelled() {
        return Err(ChatCompletionError::Cancelled { phase });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::completion_provider::StreamHandle;
    use crate::ports::stream_sink::NoStreamSink;
    use async_trait::async_trait;
    use chatstream_domain::{ApproximateTokenizer, StreamEvent};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    // ==================== Test Mocks ====================

    #[derive(Default)]
    struct RecordingStore {
        chats: Mutex<HashMap<String, Chat>>,
        find_calls: AtomicUsize,
        create_calls: AtomicUsize,
        save_calls: AtomicUsize,
        created: Mutex<Vec<Chat>>,
        saved: Mutex<Vec<Chat>>,
        fail_find: Option<String>,
        fail_save: Option<String>,
        /// Token cancelled while a write is in flight, after it has landed
        cancel_during_write: Option<CancellationToken>,
    }

    impl RecordingStore {
        fn with_chat(chat: Chat) -> Self {
            let store = Self::default();
            store
                .chats
                .lock()
                .unwrap()
                .insert(chat.id().to_string(), chat);
            store
        }

        fn stored(&self, id: &str) -> Option<Chat> {
            self.chats.lock().unwrap().get(id).cloned()
        }

        fn cancelling_on_write(token: CancellationToken) -> Self {
            Self {
                cancel_during_write: Some(token),
                ..Self::default()
            }
        }

        /// Acknowledge a committed write late, cancelling in between.
        async fn slow_ack(&self) {
            if let Some(token) = &self.cancel_during_write {
                token.cancel();
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        }
    }

    #[async_trait]
    impl ChatStore for RecordingStore {
        async fn find_chat_by_id(&self, id: &str) -> Result<Chat, ChatStoreError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = &self.fail_find {
                return Err(ChatStoreError::Backend(reason.clone()));
            }
            self.stored(id)
                .ok_or_else(|| ChatStoreError::NotFound(id.to_string()))
        }

        async fn create_chat(&self, chat: &Chat) -> Result<(), ChatStoreError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut chats = self.chats.lock().unwrap();
                if chats.contains_key(chat.id()) {
                    return Err(ChatStoreError::AlreadyExists(chat.id().to_string()));
                }
                chats.insert(chat.id().to_string(), chat.clone());
            }
            self.created.lock().unwrap().push(chat.clone());
            self.slow_ack().await;
            Ok(())
        }

        async fn save_chat(&self, chat: &Chat) -> Result<(), ChatStoreError> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = &self.fail_save {
                return Err(ChatStoreError::Backend(reason.clone()));
            }
            self.chats
                .lock()
                .unwrap()
                .insert(chat.id().to_string(), chat.clone());
            self.saved.lock().unwrap().push(chat.clone());
            self.slow_ack().await;
            Ok(())
        }
    }

    /// Replays a fixed event script for every stream it opens.
    struct ScriptedProvider {
        script: Vec<StreamEvent>,
        /// Keep the transport side open after the script (simulates a stalled stream)
        hold_open: bool,
        open_error: Option<ProviderError>,
        requests: Mutex<Vec<CompletionRequest>>,
        senders: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<StreamEvent>) -> Self {
            Self {
                script,
                hold_open: false,
                open_error: None,
                requests: Mutex::new(Vec::new()),
                senders: Mutex::new(Vec::new()),
            }
        }

        fn deltas(parts: &[&str]) -> Self {
            let mut script: Vec<StreamEvent> = parts
                .iter()
                .map(|p| StreamEvent::Delta(p.to_string()))
                .collect();
            script.push(StreamEvent::Completed);
            Self::new(script)
        }

        fn stalled(parts: &[&str]) -> Self {
            let mut provider = Self::new(
                parts
                    .iter()
                    .map(|p| StreamEvent::Delta(p.to_string()))
                    .collect(),
            );
            provider.hold_open = true;
            provider
        }

        fn failing_open(error: ProviderError) -> Self {
            let mut provider = Self::new(vec![]);
            provider.open_error = Some(error);
            provider
        }

        fn open_calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn open_stream(
            &self,
            request: &CompletionRequest,
        ) -> Result<StreamHandle, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            let (tx, handle) = StreamHandle::channel(self.script.len() + 1);
            for event in &self.script {
                tx.try_send(event.clone()).unwrap();
            }
            if self.hold_open {
                self.senders.lock().unwrap().push(tx);
            }
            Ok(handle)
        }
    }

    // ==================== Helpers ====================

    fn config_input(model_max_tokens: usize) -> ChatCompletionConfigInput {
        ChatCompletionConfigInput {
            model: "gpt-3.5-turbo".to_string(),
            model_max_tokens,
            temperature: 0.1,
            top_p: 1.0,
            n: 1,
            stop: vec![],
            max_tokens: 300,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            initial_system_message: "You are a helpful assistant".to_string(),
        }
    }

    fn input(chat_id: &str, message: &str) -> ChatCompletionInput {
        ChatCompletionInput {
            chat_id: chat_id.to_string(),
            user_id: "user-1".to_string(),
            user_message: message.to_string(),
            config: config_input(4096),
        }
    }

    fn use_case(
        store: Arc<RecordingStore>,
        provider: Arc<ScriptedProvider>,
    ) -> ChatCompletionStreamUseCase {
        ChatCompletionStreamUseCase::new(store, provider, Arc::new(ApproximateTokenizer))
    }

    /// An existing chat: system message plus `extra` alternating user/assistant turns.
    fn existing_chat(id: &str, extra: usize) -> Chat {
        let config = config_input(4096).to_chat_config();
        let system = Message::new(
            Role::System,
            "You are a helpful assistant",
            &config.model,
            &ApproximateTokenizer,
        )
        .unwrap();
        let mut chat = Chat::new(id, "user-1", system, config.clone()).unwrap();
        for i in 0..extra {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            let m = Message::new(role, format!("message {i}"), &config.model, &ApproximateTokenizer)
                .unwrap();
            chat.add_message(m).unwrap();
        }
        chat
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChatCompletionOutput>) -> Vec<String> {
        let mut contents = Vec::new();
        while let Ok(output) = rx.try_recv() {
            contents.push(output.content);
        }
        contents
    }

    // ==================== Turns ====================

    #[tokio::test]
    async fn test_new_chat_is_created_then_saved_with_three_messages() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["Hello", "!"]));
        let uc = use_case(store.clone(), provider.clone());

        let output = uc
            .execute(input("chat-a", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.chat_id, "chat-a");
        assert_eq!(output.user_id, "user-1");
        assert_eq!(output.content, "Hello!");

        let created = store.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].message_count(), 1);
        assert_eq!(created[0].messages()[0].role(), Role::System);
        assert_eq!(
            created[0].messages()[0].content(),
            "You are a helpful assistant"
        );

        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        let roles: Vec<Role> = saved[0].messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(saved[0].messages()[1].content(), "Hello");
        assert_eq!(saved[0].messages()[2].content(), "Hello!");
    }

    #[tokio::test]
    async fn test_existing_chat_streams_cumulative_snapshots() {
        let store = Arc::new(RecordingStore::with_chat(existing_chat("chat-b", 4)));
        let provider = Arc::new(ScriptedProvider::deltas(&["Hi", " there", "!"]));
        let uc = use_case(store.clone(), provider.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let output = uc
            .execute(input("chat-b", "Hey"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(drain(&mut rx), vec!["Hi", "Hi there", "Hi there!"]);
        assert_eq!(output.content, "Hi there!");
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);

        let persisted = store.stored("chat-b").unwrap();
        assert_eq!(persisted.message_count(), 7);
        assert_eq!(persisted.messages()[5].role(), Role::User);
        assert_eq!(persisted.messages()[5].content(), "Hey");
        assert_eq!(persisted.messages()[6].role(), Role::Assistant);
        assert_eq!(persisted.messages()[6].content(), "Hi there!");
    }

    #[tokio::test]
    async fn test_provider_receives_full_history() {
        let store = Arc::new(RecordingStore::with_chat(existing_chat("chat-h", 2)));
        let provider = Arc::new(ScriptedProvider::deltas(&["ok"]));
        let uc = use_case(store, provider.clone());

        uc.execute(input("chat-h", "next"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[3].content, "next");
        assert_eq!(requests[0].model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_snapshot_count_matches_delta_count() {
        let parts: Vec<String> = (0..25).map(|i| format!("t{i} ")).collect();
        let part_refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&part_refs));
        let uc = use_case(store, provider);
        let (tx, mut rx) = mpsc::unbounded_channel();

        uc.execute(input("chat-p", "go"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        let snapshots = drain(&mut rx);
        assert_eq!(snapshots.len(), parts.len());
        for (i, snapshot) in snapshots.iter().enumerate() {
            assert_eq!(*snapshot, parts[..=i].concat());
        }
    }

    #[tokio::test]
    async fn test_find_failure_is_store_error_without_writes() {
        let store = Arc::new(RecordingStore {
            fail_find: Some("connection refused".to_string()),
            ..Default::default()
        });
        let provider = Arc::new(ScriptedProvider::deltas(&["unused"]));
        let uc = use_case(store.clone(), provider.clone());

        let err = uc
            .execute(input("chat-c", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(err.phase(), TurnPhase::Loading);
        assert!(err.is_retryable());
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_mid_stream_error_publishes_prefix_and_skips_save() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::new(vec![
            StreamEvent::Delta("Hi".to_string()),
            StreamEvent::Error("connection reset".to_string()),
        ]));
        let uc = use_case(store.clone(), provider);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = uc
            .execute(input("chat-d", "Hello"), &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.phase(), TurnPhase::Streaming);
        assert_eq!(drain(&mut rx), vec!["Hi"]);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_persisted_chat_unchanged() {
        let before = existing_chat("chat-e", 2);
        let store = Arc::new(RecordingStore::with_chat(before.clone()));
        let provider = Arc::new(ScriptedProvider::new(vec![
            StreamEvent::Delta("partial".to_string()),
            StreamEvent::Error("boom".to_string()),
        ]));
        let uc = use_case(store.clone(), provider);

        uc.execute(input("chat-e", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(store.stored("chat-e").unwrap(), before);
    }

    #[tokio::test]
    async fn test_stream_closed_without_end_is_provider_error() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::new(vec![StreamEvent::Delta(
            "cut".to_string(),
        )]));
        let uc = use_case(store.clone(), provider);

        let err = uc
            .execute(input("chat-t", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChatCompletionError::Provider {
                phase: TurnPhase::Streaming,
                source: ProviderError::TransportClosed
            }
        ));
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_provider_error() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::failing_open(
            ProviderError::Authentication("invalid api key".to_string()),
        ));
        let uc = use_case(store.clone(), provider);

        let err = uc
            .execute(input("chat-o", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.phase(), TurnPhase::Requesting);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_failure_is_commit_error() {
        let before = existing_chat("chat-f", 0);
        let store = Arc::new(RecordingStore {
            fail_save: Some("disk full".to_string()),
            ..RecordingStore::with_chat(before.clone())
        });
        let provider = Arc::new(ScriptedProvider::deltas(&["done"]));
        let uc = use_case(store.clone(), provider);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = uc
            .execute(input("chat-f", "Hello"), &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Commit);
        assert_eq!(err.phase(), TurnPhase::Finalizing);
        assert!(err.is_retryable());
        assert_eq!(drain(&mut rx), vec!["done"]);
        assert_eq!(store.stored("chat-f").unwrap(), before);
    }

    #[tokio::test]
    async fn test_second_turn_finds_created_chat() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["reply"]));
        let uc = use_case(store.clone(), provider);
        let token = CancellationToken::new();

        uc.execute(input("chat-g", "one"), &NoStreamSink, &token)
            .await
            .unwrap();
        uc.execute(input("chat-g", "two"), &NoStreamSink, &token)
            .await
            .unwrap();

        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.find_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.stored("chat-g").unwrap().message_count(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_first_turns_create_once() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["reply"]));
        let uc = use_case(store.clone(), provider);

        let token = CancellationToken::new();
        let (a, b) = tokio::join!(
            uc.execute(input("chat-race", "one"), &NoStreamSink, &token),
            uc.execute(input("chat-race", "two"), &NoStreamSink, &token),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stored("chat-race").unwrap().message_count(), 5);
    }

    #[tokio::test]
    async fn test_cancellation_mid_stream_does_not_persist() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::stalled(&["Hi"]));
        let uc = use_case(store.clone(), provider);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            async move {
                let first = rx.recv().await.unwrap();
                token.cancel();
                first
            }
        };
        let (result, first) = tokio::join!(uc.execute(input("chat-x", "Hello"), &tx, &token), canceller);

        assert_eq!(first.content, "Hi");
        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.phase(), TurnPhase::Streaming);
        assert!(!err.is_retryable());
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_during_save_still_commits() {
        let token = CancellationToken::new();
        let store = Arc::new(RecordingStore::cancelling_on_write(token.clone()));
        store
            .chats
            .lock()
            .unwrap()
            .insert("chat-f".to_string(), existing_chat("chat-f", 0));
        let provider = Arc::new(ScriptedProvider::deltas(&["Hi"]));
        let uc = use_case(store.clone(), provider);

        let output = uc
            .execute(input("chat-f", "Hello"), &NoStreamSink, &token)
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert_eq!(output.content, "Hi");
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stored("chat-f").unwrap().message_count(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_during_create_stops_before_request() {
        let token = CancellationToken::new();
        let store = Arc::new(RecordingStore::cancelling_on_write(token.clone()));
        let provider = Arc::new(ScriptedProvider::deltas(&["Hi"]));
        let uc = use_case(store.clone(), provider.clone());

        let err = uc
            .execute(input("chat-c", "Hello"), &NoStreamSink, &token)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.phase(), TurnPhase::Requesting);
        // The created chat is kept, so a retry finds it instead of creating again
        assert_eq!(store.stored("chat-c").unwrap().message_count(), 1);
        assert_eq!(provider.open_calls(), 0);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_touches_nothing() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["Hi"]));
        let uc = use_case(store.clone(), provider.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = uc
            .execute(input("chat-n", "Hello"), &NoStreamSink, &token)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_closed_sink_fails_turn() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["a", "b"]));
        let uc = use_case(store.clone(), provider);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let err = uc
            .execute(input("chat-s", "Hello"), &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SinkClosed);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_user_message_over_budget_fails_before_request() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["unused"]));
        let uc = use_case(store.clone(), provider.clone());
        let mut turn = input("chat-budget", &"word ".repeat(200));
        turn.config = config_input(32);

        let err = uc
            .execute(turn, &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BudgetExceeded);
        assert_eq!(err.phase(), TurnPhase::Appending);
        assert!(!err.is_retryable());
        assert_eq!(provider.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_eviction_keeps_budget_and_full_history() {
        let store = Arc::new(RecordingStore::default());
        // 28 bytes: 7 approximate tokens
        let provider = Arc::new(ScriptedProvider::deltas(&["bbbbbbbbbbbbbb", "bbbbbbbbbbbbbb"]));
        let uc = use_case(store.clone(), provider);
        let token = CancellationToken::new();

        for _ in 0..2 {
            // 24 bytes: 6 tokens; system message is 7, budget 20
            let mut turn = input("chat-evict", &"a".repeat(24));
            turn.config = config_input(20);
            uc.execute(turn, &NoStreamSink, &token).await.unwrap();
        }

        let chat = store.stored("chat-evict").unwrap();
        assert!(chat.token_usage() <= 20);
        let roles: Vec<Role> = chat.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        let erased: Vec<Role> = chat.erased_messages().iter().map(Message::role).collect();
        assert_eq!(erased, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_invalid_config_is_validation_error() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["unused"]));
        let uc = use_case(store.clone(), provider);
        let mut turn = input("chat-v", "Hello");
        turn.config.temperature = 5.0;

        let err = uc
            .execute(turn, &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.phase(), TurnPhase::Creating);
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_reply_fails_finalizing() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&[]));
        let uc = use_case(store.clone(), provider);

        let err = uc
            .execute(input("chat-empty", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.phase(), TurnPhase::Finalizing);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_chat_id_generates_one() {
        let store = Arc::new(RecordingStore::default());
        let provider = Arc::new(ScriptedProvider::deltas(&["hi"]));
        let uc = use_case(store.clone(), provider);

        let output = uc
            .execute(input("", "Hello"), &NoStreamSink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!output.chat_id.is_empty());
        assert!(store.stored(&output.chat_id).is_some());
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = ChatCompletionError::Domain {
            phase: TurnPhase::Appending,
            source: DomainError::Tokenization("bad".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Tokenization);
        assert!(!err.is_retryable());

        let err = ChatCompletionError::Store {
            phase: TurnPhase::Creating,
            source: ChatStoreError::Backend("down".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(
            err.to_string(),
            "Store error creating chat: Backend error: down"
        );
    }
}
