//! Message entity

use crate::core::error::DomainError;
use crate::core::model::Model;
use crate::core::tokenizer::Tokenizer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(DomainError::validation(format!("invalid role: {other}"))),
        }
    }
}

/// One turn in a conversation (Entity)
///
/// The token count is measured once, against the model active when the
/// message is created, and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    role: Role,
    content: String,
    tokens: usize,
    model: Model,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message, counting its tokens under `model`.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Validation`] if `content` is empty
    /// - [`DomainError::Tokenization`] if the tokenizer cannot encode `content`
    pub fn new(
        role: Role,
        content: impl Into<String>,
        model: &Model,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        if content.is_empty() {
            return Err(DomainError::validation(format!(
                "{role} message content is empty"
            )));
        }

        let tokens = tokenizer.count_tokens(model, &content)?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            tokens,
            model: model.clone(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Token count measured at creation time
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// Model the token count was measured against
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
