//! Exchange domain - cached question/answer pairs and matching rules
//!
//! An exchange is written once after a generation cycle misses the cache and
//! is later matched against new prompts by exact or near-duplicate text.

mod config;
mod entity;
mod repository;
mod similarity;

pub use config::ExchangeCacheConfig;
pub use entity::{normalize_prompt, CachedExchange, ExchangeId, NewExchange};
pub use repository::{ExchangeRepository, ExchangeWindow};
pub use similarity::{levenshtein, similarity};

#[cfg(test)]
pub use repository::MockExchangeRepository;
