//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::StorageEntity;
use super::query::StorageQuery;

/// Generic append-and-select storage for document entities
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    /// Inserts a new entity, returns a conflict if the key is taken
    async fn insert(&self, entity: E) -> Result<E, DomainError>;

    /// Returns entities matching every condition, ordered and limited
    async fn select(&self, query: &StorageQuery) -> Result<Vec<E>, DomainError>;

    /// Returns the count of entities
    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.select(&StorageQuery::new()).await?.len())
    }
}
