//! TeamUp assistant backend
//!
//! Serves the AI chat and post-summary endpoints of the TeamUp matching
//! platform. Answers are cached per category and user so that repeated or
//! near-duplicate questions skip the model call:
//! - Exact and near-duplicate prompt matching over a bounded recent window
//! - Detached persistence with bounded retry and backoff
//! - Google Gemini and Groq providers with streaming

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::exchange::CachedExchange;
use infrastructure::{
    exchange::{StorageExchangeRepository, EXCHANGES_TABLE},
    llm::{LlmProviderFactory, ProviderKeys, ProviderRegistry},
    services::{ChatService, ExchangeCacheService, SummaryService},
    storage::StorageFactory,
};
use tracing::{info, warn};

/// Create the application state from configuration and provider keys in
/// the environment
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let providers = LlmProviderFactory::registry(&ProviderKeys::from_env())?;
    create_app_state_with_providers(config, providers).await
}

/// Create the application state with an explicit provider registry
pub async fn create_app_state_with_providers(
    config: &AppConfig,
    providers: ProviderRegistry,
) -> anyhow::Result<AppState> {
    let storage_config = config.storage.to_storage_config()?;
    info!(backend = ?storage_config.storage_type(), "Initializing exchange storage");

    if !config.storage.is_persistent() {
        warn!("Exchange cache is in-memory; cached answers are lost on restart");
    }

    let storage = StorageFactory::create::<CachedExchange>(&storage_config, EXCHANGES_TABLE).await?;
    let repository = Arc::new(StorageExchangeRepository::new(storage));
    let exchange_cache = Arc::new(ExchangeCacheService::with_config(
        repository,
        config.cache.clone(),
    ));

    if !providers.is_configured(config.assistant.default_provider) {
        warn!(
            provider = %config.assistant.default_provider,
            "Default provider has no API key; uncached chat requests will fail"
        );
    }

    let chat_service = Arc::new(ChatService::new(
        exchange_cache.clone(),
        providers.clone(),
        config.assistant.clone(),
    ));
    let summary_service = Arc::new(SummaryService::new(
        providers.clone(),
        config.assistant.clone(),
    ));

    Ok(AppState::new(
        chat_service,
        summary_service,
        exchange_cache,
        providers,
    ))
}
