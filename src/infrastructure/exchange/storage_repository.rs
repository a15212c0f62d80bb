//! Storage-backed exchange repository

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::DomainError;
use crate::domain::exchange::{CachedExchange, ExchangeId, ExchangeRepository, ExchangeWindow};
use crate::domain::storage::{SortDirection, SortKind, Storage, StorageQuery};

/// Table holding cached exchanges
pub const EXCHANGES_TABLE: &str = "ai_responses";

/// Storage-backed implementation of ExchangeRepository
#[derive(Debug)]
pub struct StorageExchangeRepository {
    storage: Arc<dyn Storage<CachedExchange>>,
}

impl StorageExchangeRepository {
    /// Create a new storage-backed repository
    pub fn new(storage: Arc<dyn Storage<CachedExchange>>) -> Self {
        Self { storage }
    }

    fn window_query(window: &ExchangeWindow) -> StorageQuery {
        let mut query = StorageQuery::new()
            .eq("category", window.category.as_str())
            .gte("created_at", window.since);

        if let Some(ref user_id) = window.user_id {
            query = query.eq("user_id", user_id.as_str());
        }

        query
            .order_by("created_at", SortKind::Timestamp, SortDirection::Desc)
            .limit(window.limit)
    }
}

#[async_trait]
impl ExchangeRepository for StorageExchangeRepository {
    async fn recent(&self, window: &ExchangeWindow) -> Result<Vec<CachedExchange>, DomainError> {
        self.storage.select(&Self::window_query(window)).await
    }

    async fn insert(&self, exchange: CachedExchange) -> Result<ExchangeId, DomainError> {
        let stored = self.storage.insert(exchange).await?;
        Ok(stored.id)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        self.storage.count().await
    }
}
