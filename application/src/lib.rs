//! Application layer for chatstream
//!
//! This crate contains the turn use case and the port definitions its
//! adapters implement. It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    chat_store::{ChatStore, ChatStoreError},
    completion_provider::{
        CompletionProvider, CompletionRequest, PromptMessage, ProviderError, StreamHandle,
    },
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    stream_sink::{NoStreamSink, SinkError, StreamSink},
};
pub use use_cases::chat_completion_stream::{
    ChatCompletionConfigInput, ChatCompletionError, ChatCompletionInput, ChatCompletionOutput,
    ChatCompletionStreamUseCase, ErrorKind, TurnPhase,
};
pub use use_cases::chat_locks::{ChatGuard, ChatLocks};
