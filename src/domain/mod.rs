//! Domain layer - Core business logic and entities

pub mod chat;
pub mod error;
pub mod exchange;
pub mod llm;
pub mod storage;

pub use error::DomainError;
pub use exchange::{
    normalize_prompt, similarity, CachedExchange, ExchangeCacheConfig, ExchangeId,
    ExchangeRepository, ExchangeWindow, NewExchange,
};
pub use llm::{
    FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, LlmStream, Message,
    MessageRole, ProviderKind, StreamChunk, Usage,
};
pub use storage::{Storage, StorageEntity, StorageKey};
