//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::services::{
    ChatServiceTrait, ExchangeCacheServiceTrait, SummaryServiceTrait,
};

/// Services shared by every handler, behind trait objects so tests can
/// swap any of them
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<dyn ChatServiceTrait>,
    pub summary_service: Arc<dyn SummaryServiceTrait>,
    pub exchange_cache: Arc<dyn ExchangeCacheServiceTrait>,
    pub providers: ProviderRegistry,
}

impl AppState {
    pub fn new(
        chat_service: Arc<dyn ChatServiceTrait>,
        summary_service: Arc<dyn SummaryServiceTrait>,
        exchange_cache: Arc<dyn ExchangeCacheServiceTrait>,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            chat_service,
            summary_service,
            exchange_cache,
            providers,
        }
    }
}
