//! Chat aggregate root

use super::config::ChatConfig;
use super::message::{Message, Role};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    #[default]
    Active,
    Ended,
}

/// A persisted conversation (Aggregate Root)
///
/// Holds the bound [`ChatConfig`] and the ordered message history, which
/// always opens with the system message. History is append-only: when a new
/// message would overflow the model's context budget, the oldest non-system
/// messages are moved to [`erased_messages`](Self::erased_messages) until it
/// fits. The system message is never evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    id: String,
    user_id: String,
    config: ChatConfig,
    messages: Vec<Message>,
    #[serde(default)]
    erased_messages: Vec<Message>,
    #[serde(default)]
    status: ChatStatus,
}

impl Chat {
    /// Start a new chat opened by `initial_message`.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Validation`] for an empty id or user id, an initial
    ///   message that is not a system message, or an invalid config
    /// - [`DomainError::BudgetExceeded`] if the system message alone does not
    ///   fit in the model's context budget
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        initial_message: Message,
        config: ChatConfig,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        let user_id = user_id.into();

        if id.trim().is_empty() {
            return Err(DomainError::validation("chat id is empty"));
        }
        if user_id.trim().is_empty() {
            return Err(DomainError::validation("user id is empty"));
        }
        if initial_message.role() != Role::System {
            return Err(DomainError::validation(format!(
                "initial message must be a system message, got {}",
                initial_message.role()
            )));
        }
        config.validate()?;

        let budget = config.model.max_tokens();
        if initial_message.tokens() > budget {
            return Err(DomainError::BudgetExceeded {
                required: initial_message.tokens(),
                available: budget,
            });
        }

        Ok(Self {
            id,
            user_id,
            config,
            messages: vec![initial_message],
            erased_messages: Vec::new(),
            status: ChatStatus::Active,
        })
    }

    /// Append a message, evicting the oldest non-system history if needed.
    ///
    /// On error the chat is left unchanged.
    pub fn add_message(&mut self, message: Message) -> Result<(), DomainError> {
        if self.is_ended() {
            return Err(DomainError::validation(
                "chat has ended; no more messages allowed",
            ));
        }

        let budget = self.config.model.max_tokens();
        let pinned = self.pinned_len();
        let pinned_tokens: usize = self.messages[..pinned].iter().map(Message::tokens).sum();
        let available = budget.saturating_sub(pinned_tokens);
        if message.tokens() > available {
            return Err(DomainError::BudgetExceeded {
                required: message.tokens(),
                available,
            });
        }

        let mut usage = self.token_usage();
        let mut evict = 0;
        while usage + message.tokens() > budget {
            usage -= self.messages[pinned + evict].tokens();
            evict += 1;
        }
        self.erased_messages
            .extend(self.messages.drain(pinned..pinned + evict));
        self.messages.push(message);
        Ok(())
    }

    /// Mark the chat as ended; further appends are rejected.
    pub fn end(&mut self) {
        self.status = ChatStatus::Ended;
    }

    pub fn is_ended(&self) -> bool {
        self.status == ChatStatus::Ended
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    /// Live history, in conversation order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// History evicted to respect the token budget, oldest first
    pub fn erased_messages(&self) -> &[Message] {
        &self.erased_messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Sum of token counts across the live history
    pub fn token_usage(&self) -> usize {
        self.messages.iter().map(Message::tokens).sum()
    }

    // Number of leading messages that eviction must keep (the system message).
    fn pinned_len(&self) -> usize {
        match self.messages.first() {
            Some(first) if first.role() == Role::System => 1,
            _ => 0,
        }
    }
}
