//! Infrastructure services

mod chat_service;
mod exchange_cache_service;
mod summary_service;

pub use chat_service::{
    ChatAnswer, ChatCommand, ChatReply, ChatService, ChatServiceTrait, ChatStream,
};
pub use exchange_cache_service::{
    find_match, CacheHit, ExchangeCacheService, ExchangeCacheServiceTrait, MatchKind,
};
pub use summary_service::{SummaryService, SummaryServiceTrait};
