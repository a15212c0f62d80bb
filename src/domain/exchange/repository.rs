//! Exchange repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CachedExchange, ExchangeId};
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Candidate window for a lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeWindow {
    pub category: String,
    /// Restrict to one owner; `None` searches the whole category
    pub user_id: Option<String>,
    /// Oldest `created_at` still visible
    pub since: DateTime<Utc>,
    pub limit: usize,
}

/// Repository for cached exchanges
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExchangeRepository: Send + Sync {
    /// Most recent exchanges in the window, newest first
    async fn recent(&self, window: &ExchangeWindow) -> Result<Vec<CachedExchange>, DomainError>;

    /// Appends an exchange and returns its identifier
    async fn insert(&self, exchange: CachedExchange) -> Result<ExchangeId, DomainError>;

    /// Number of stored exchanges
    async fn count(&self) -> Result<usize, DomainError>;
}
