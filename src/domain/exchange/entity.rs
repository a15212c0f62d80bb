//! Exchange entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::storage::{StorageEntity, StorageKey};

/// Unique identifier for a cached exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for ExchangeId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Canonical form used for both exact and similarity matching
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// A persisted question/answer pair
///
/// Created once by the background writer and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedExchange {
    pub id: ExchangeId,
    /// Owner scope; `None` means the exchange is shared
    #[serde(default)]
    pub user_id: Option<String>,
    /// Normalized prompt
    pub prompt: String,
    /// Prompt as the user typed it
    #[serde(default)]
    pub display_prompt: String,
    pub response: String,
    pub category: String,
    #[serde(default)]
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl StorageEntity for CachedExchange {
    type Key = ExchangeId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

impl CachedExchange {
    /// Materialize a write request into a stored record
    pub fn from_new(new: NewExchange, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ExchangeId::generate(),
            user_id: new.user_id,
            prompt: normalize_prompt(&new.prompt),
            display_prompt: new.prompt,
            response: new.response,
            category: new.category,
            tokens_used: new.tokens_used,
            created_at,
        }
    }
}

/// Payload handed to the background writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExchange {
    pub user_id: Option<String>,
    pub prompt: String,
    pub response: String,
    pub category: String,
    pub tokens_used: Option<u32>,
}

impl NewExchange {
    pub fn new(
        prompt: impl Into<String>,
        response: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            user_id: None,
            prompt: prompt.into(),
            response: response.into(),
            category: category.into(),
            tokens_used: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tokens_used(mut self, tokens: u32) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}
