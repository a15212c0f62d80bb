//! Exchange cache service
//!
//! Looks up previously generated answers by exact or near-duplicate prompt
//! and persists new answers in the background with bounded retries.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

use crate::domain::DomainError;
use crate::domain::exchange::{
    normalize_prompt, similarity, CachedExchange, ExchangeCacheConfig, ExchangeId,
    ExchangeRepository, ExchangeWindow, NewExchange,
};
use crate::infrastructure::observability::{
    record_cache_lookup, record_cache_write, record_cache_write_attempt, CacheLookupOutcome,
    CacheWriteOutcome,
};

/// How a cached exchange matched the incoming prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    /// Near-duplicate with its similarity score
    Similar(f64),
}

/// A cached exchange returned by lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub exchange: CachedExchange,
    pub kind: MatchKind,
}

/// Find the first match in recency order
///
/// An exact pass runs over every candidate before any similarity is
/// computed; the similarity pass then returns the first candidate at or
/// above `threshold`, not the best-scoring one.
pub fn find_match(
    normalized: &str,
    candidates: &[CachedExchange],
    threshold: f64,
) -> Option<(usize, MatchKind)> {
    let normalized_candidates: Vec<String> = candidates
        .iter()
        .map(|c| normalize_prompt(&c.prompt))
        .collect();

    if let Some(index) = normalized_candidates.iter().position(|c| c == normalized) {
        return Some((index, MatchKind::Exact));
    }

    normalized_candidates
        .iter()
        .enumerate()
        .find_map(|(index, candidate)| {
            let score = similarity(normalized, candidate);
            (score >= threshold).then_some((index, MatchKind::Similar(score)))
        })
}

/// Response cache backed by an exchange repository
#[derive(Clone)]
pub struct ExchangeCacheService {
    repository: Arc<dyn ExchangeRepository>,
    config: ExchangeCacheConfig,
}

impl std::fmt::Debug for ExchangeCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCacheService")
            .field("config", &self.config)
            .finish()
    }
}

impl ExchangeCacheService {
    pub fn new(repository: Arc<dyn ExchangeRepository>) -> Self {
        Self::with_config(repository, ExchangeCacheConfig::default())
    }

    pub fn with_config(repository: Arc<dyn ExchangeRepository>, config: ExchangeCacheConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &ExchangeCacheConfig {
        &self.config
    }

    /// Find a cached answer for `prompt` in `category`
    ///
    /// Never fails: store errors are logged and reported as a miss.
    pub async fn lookup(
        &self,
        prompt: &str,
        category: &str,
        user_id: Option<&str>,
    ) -> Option<CacheHit> {
        if !self.config.enabled {
            return None;
        }

        let started = Instant::now();
        let normalized = normalize_prompt(prompt);
        let since = Utc::now() - self.config.retention();

        let window = ExchangeWindow {
            category: category.to_string(),
            user_id: user_id.map(str::to_string),
            since,
            limit: self.config.scan_limit,
        };

        let candidates = match self.repository.recent(&window).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(category, error = %e, "Exchange lookup failed, treating as miss");
                record_cache_lookup(category, CacheLookupOutcome::Error, started.elapsed());
                return None;
            }
        };

        // The window is enforced here as well so a lax backend cannot widen it
        let mut visible: Vec<CachedExchange> = candidates
            .into_iter()
            .filter(|c| c.category == category && c.created_at >= since)
            .filter(|c| user_id.is_none_or(|u| c.user_id.as_deref() == Some(u)))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible.truncate(self.config.scan_limit);

        let found = find_match(&normalized, &visible, self.config.similarity_threshold);

        let outcome = match found {
            Some((_, MatchKind::Exact)) => CacheLookupOutcome::Exact,
            Some((_, MatchKind::Similar(_))) => CacheLookupOutcome::Similar,
            None => CacheLookupOutcome::Miss,
        };
        record_cache_lookup(category, outcome, started.elapsed());

        let (index, kind) = found?;

        match kind {
            MatchKind::Exact => debug!(category, "Cache hit: exact prompt match"),
            MatchKind::Similar(score) => {
                debug!(category, similarity = score, "Cache hit: similar prompt match")
            }
        }

        Some(CacheHit {
            exchange: visible.swap_remove(index),
            kind,
        })
    }

    /// Persist an exchange, retrying transient failures with backoff
    ///
    /// Returns the new identifier, or `None` once the write is discarded.
    pub async fn store(&self, exchange: NewExchange) -> Option<ExchangeId> {
        if !self.config.enabled {
            return None;
        }

        let record = CachedExchange::from_new(exchange, Utc::now());
        let max_attempts = self.config.max_attempts();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.config.delay_for_attempt(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            record_cache_write_attempt();

            match self.repository.insert(record.clone()).await {
                Ok(id) => {
                    debug!(exchange_id = %id, category = %record.category, "Exchange stored");
                    record_cache_write(CacheWriteOutcome::Stored);
                    return Some(id);
                }
                // An earlier attempt that reported a timeout may have landed
                Err(DomainError::Conflict { .. }) if attempt > 0 => {
                    debug!(exchange_id = %record.id, "Exchange already stored by an earlier attempt");
                    record_cache_write(CacheWriteOutcome::Stored);
                    return Some(record.id);
                }
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    warn!(
                        attempt = attempt + 1,
                        remaining = max_attempts - attempt - 1,
                        error = %e,
                        "Exchange write failed, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        attempts = attempt + 1,
                        transient = e.is_transient(),
                        error = %e,
                        "Discarding exchange write"
                    );
                    break;
                }
            }
        }

        record_cache_write(CacheWriteOutcome::Discarded);
        None
    }

    /// Spawn `store` without awaiting it
    ///
    /// The task outlives the caller and contains its own panics.
    pub fn store_detached(&self, exchange: NewExchange) -> JoinHandle<Option<ExchangeId>> {
        let service = self.clone();
        let span = tracing::info_span!("exchange_write", category = %exchange.category);

        tokio::spawn(
            async move {
                match AssertUnwindSafe(service.store(exchange)).catch_unwind().await {
                    Ok(id) => id,
                    Err(_) => {
                        error!("Background exchange write panicked");
                        record_cache_write(CacheWriteOutcome::Discarded);
                        None
                    }
                }
            }
            .instrument(span),
        )
    }

    /// Checks that the backing store answers
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }
}

/// Trait for exchange cache operations
#[async_trait::async_trait]
pub trait ExchangeCacheServiceTrait: Send + Sync + std::fmt::Debug {
    async fn lookup(&self, prompt: &str, category: &str, user_id: Option<&str>)
    -> Option<CacheHit>;

    async fn store(&self, exchange: NewExchange) -> Option<ExchangeId>;

    fn store_detached(&self, exchange: NewExchange) -> JoinHandle<Option<ExchangeId>>;

    async fn count(&self) -> Result<usize, DomainError>;
}

#[async_trait::async_trait]
impl ExchangeCacheServiceTrait for ExchangeCacheService {
    async fn lookup(
        &self,
        prompt: &str,
        category: &str,
        user_id: Option<&str>,
    ) -> Option<CacheHit> {
        ExchangeCacheService::lookup(self, prompt, category, user_id).await
    }

    async fn store(&self, exchange: NewExchange) -> Option<ExchangeId> {
        ExchangeCacheService::store(self, exchange).await
    }

    fn store_detached(&self, exchange: NewExchange) -> JoinHandle<Option<ExchangeId>> {
        ExchangeCacheService::store_detached(self, exchange)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        ExchangeCacheService::count(self).await
    }
}
