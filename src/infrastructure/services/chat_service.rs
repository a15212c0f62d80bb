//! Chat assistant service
//!
//! Answers a conversation from the exchange cache when possible, otherwise
//! generates with the requested provider and stores the answer in the
//! background.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::exchange_cache_service::ExchangeCacheServiceTrait;
use crate::domain::chat::{clean_response, estimate_tokens, AssistantConfig};
use crate::domain::{
    DomainError, LlmProvider, LlmRequest, Message, NewExchange, ProviderKind,
};
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

/// Deltas buffered between the provider and a slow client
const STREAM_BUFFER: usize = 16;

/// Stream of text deltas for a generated answer
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

/// A chat turn submitted by an authenticated user
#[derive(Debug, Clone)]
pub struct ChatCommand {
    pub user_id: String,
    pub messages: Vec<Message>,
    pub category: String,
    pub provider: Option<ProviderKind>,
    pub stream: bool,
}

/// A complete answer, cached or freshly generated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub response: String,
    pub tokens_used: Option<u32>,
    pub cached: bool,
}

/// Result of a chat turn
pub enum ChatReply {
    Complete(ChatAnswer),
    Stream(ChatStream),
}

impl std::fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(answer) => f.debug_tuple("Complete").field(answer).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Chat service backed by the exchange cache and the LLM providers
#[derive(Debug, Clone)]
pub struct ChatService {
    cache: Arc<dyn ExchangeCacheServiceTrait>,
    providers: ProviderRegistry,
    config: AssistantConfig,
}

impl ChatService {
    pub fn new(
        cache: Arc<dyn ExchangeCacheServiceTrait>,
        providers: ProviderRegistry,
        config: AssistantConfig,
    ) -> Self {
        Self {
            cache,
            providers,
            config,
        }
    }

    /// Prompt that keys the cache: the last message, trimmed
    fn validate(&self, command: &ChatCommand) -> Result<String, DomainError> {
        let prompt = command
            .messages
            .last()
            .map(|m| m.content_text().trim().to_string())
            .unwrap_or_default();

        if prompt.is_empty() {
            return Err(DomainError::validation("Please enter a question."));
        }

        if prompt.chars().count() > self.config.max_prompt_chars {
            return Err(DomainError::validation(format!(
                "Questions are limited to {} characters.",
                self.config.max_prompt_chars
            )));
        }

        Ok(prompt)
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> LlmRequest {
        let conversation: Vec<Message> = messages
            .iter()
            .filter(|m| !m.content_text().trim().is_empty())
            .cloned()
            .collect();

        LlmRequest::builder()
            .messages(conversation)
            .system(self.config.system_prompt.clone())
            .max_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature)
            .stream(stream)
            .build()
    }

    /// Answer a chat turn
    ///
    /// Validation and provider failures are returned; cache failures are not.
    pub async fn chat(&self, command: ChatCommand) -> Result<ChatReply, DomainError> {
        let prompt = self.validate(&command)?;

        if let Some(hit) = self
            .cache
            .lookup(&prompt, &command.category, Some(&command.user_id))
            .await
        {
            info!(category = %command.category, "Serving cached answer");
            return Ok(ChatReply::Complete(ChatAnswer {
                response: hit.exchange.response,
                tokens_used: hit.exchange.tokens_used,
                cached: true,
            }));
        }

        let kind = command.provider.unwrap_or(self.config.default_provider);
        let provider = self.providers.get(kind)?;
        let model = provider.default_model().to_string();
        let request = self.build_request(&command.messages, command.stream);

        let exchange = PendingExchange {
            user_id: command.user_id,
            prompt,
            category: command.category,
        };

        if command.stream {
            self.generate_stream(provider, model, request, exchange).await
        } else {
            self.generate(provider, model, request, exchange).await
        }
    }

    async fn generate(
        &self,
        provider: Arc<dyn LlmProvider>,
        model: String,
        request: LlmRequest,
        exchange: PendingExchange,
    ) -> Result<ChatReply, DomainError> {
        let started = Instant::now();
        let result = provider.chat(&model, request).await;

        record_llm_request(LlmRequestMetricParams {
            provider: provider.provider_name(),
            model: &model,
            duration: started.elapsed(),
            success: result.is_ok(),
            total_tokens: result
                .as_ref()
                .ok()
                .and_then(|r| r.usage.as_ref())
                .map(|u| u64::from(u.total_tokens)),
        });

        let response = result?;
        let text = clean_response(response.content());
        if text.is_empty() {
            warn!(provider = provider.provider_name(), "Provider returned an empty answer");
            return Err(DomainError::provider(
                provider.provider_name(),
                "Empty response from model",
            ));
        }

        let tokens_used = response
            .usage
            .as_ref()
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| estimate_tokens(&text));

        self.cache.store_detached(exchange.into_new(&text, tokens_used));

        Ok(ChatReply::Complete(ChatAnswer {
            response: text,
            tokens_used: Some(tokens_used),
            cached: false,
        }))
    }

    async fn generate_stream(
        &self,
        provider: Arc<dyn LlmProvider>,
        model: String,
        request: LlmRequest,
        exchange: PendingExchange,
    ) -> Result<ChatReply, DomainError> {
        let started = Instant::now();
        let mut upstream = match provider.chat_stream(&model, request).await {
            Ok(stream) => stream,
            Err(e) => {
                record_llm_request(LlmRequestMetricParams {
                    provider: provider.provider_name(),
                    model: &model,
                    duration: started.elapsed(),
                    success: false,
                    total_tokens: None,
                });
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel::<Result<String, DomainError>>(STREAM_BUFFER);
        let cache = Arc::clone(&self.cache);
        let provider_name = provider.provider_name();

        tokio::spawn(async move {
            let mut text = String::new();
            let mut total_tokens = None;
            let mut failed = false;

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        if let Some(usage) = chunk.usage {
                            total_tokens = Some(usage.total_tokens);
                        }
                        let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) else {
                            continue;
                        };
                        text.push_str(&delta);
                        if tx.send(Ok(delta)).await.is_err() {
                            debug!("Client disconnected, abandoning generation");
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(provider = provider_name, error = %e, "Stream failed mid-generation");
                        failed = true;
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }

            record_llm_request(LlmRequestMetricParams {
                provider: provider_name,
                model: &model,
                duration: started.elapsed(),
                success: !failed,
                total_tokens: total_tokens.map(u64::from),
            });

            if !failed && text.is_empty() {
                warn!(provider = provider_name, "Provider streamed an empty answer");
                let _ = tx
                    .send(Err(DomainError::provider(provider_name, "Empty response from model")))
                    .await;
                return;
            }

            if failed || tx.is_closed() {
                return;
            }

            let tokens_used = total_tokens.unwrap_or_else(|| estimate_tokens(&text));
            cache.store_detached(exchange.into_new(&text, tokens_used));
        });

        Ok(ChatReply::Stream(Box::pin(ReceiverStream::new(rx))))
    }
}

/// Cache key fields carried until the answer is known
#[derive(Debug)]
struct PendingExchange {
    user_id: String,
    prompt: String,
    category: String,
}

impl PendingExchange {
    fn into_new(self, response: &str, tokens_used: u32) -> NewExchange {
        NewExchange::new(self.prompt, response, self.category)
            .with_user(self.user_id)
            .with_tokens_used(tokens_used)
    }
}

/// Trait for chat operations
#[async_trait::async_trait]
pub trait ChatServiceTrait: Send + Sync + std::fmt::Debug {
    async fn chat(&self, command: ChatCommand) -> Result<ChatReply, DomainError>;
}

#[async_trait::async_trait]
impl ChatServiceTrait for ChatService {
    async fn chat(&self, command: ChatCommand) -> Result<ChatReply, DomainError> {
        ChatService::chat(self, command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::exchange::{CachedExchange, ExchangeCacheConfig};
    use crate::domain::llm::{MockLlmProvider, Usage};
    use crate::infrastructure::exchange::StorageExchangeRepository;
    use crate::infrastructure::services::ExchangeCacheService;
    use crate::infrastructure::storage::InMemoryStorage;

    struct Fixture {
        service: ChatService,
        cache: Arc<ExchangeCacheService>,
        provider: Arc<MockLlmProvider>,
    }

    fn create_service(provider: MockLlmProvider) -> Fixture {
        let storage = InMemoryStorage::<CachedExchange>::new();
        let repository = StorageExchangeRepository::new(Arc::new(storage));
        let cache = Arc::new(ExchangeCacheService::with_config(
            Arc::new(repository),
            ExchangeCacheConfig::default().with_backoff_base_ms(1),
        ));

        let provider = Arc::new(provider);
        let registry =
            ProviderRegistry::new().with_provider(ProviderKind::Google, provider.clone());

        Fixture {
            service: ChatService::new(cache.clone(), registry, AssistantConfig::default()),
            cache,
            provider,
        }
    }

    fn command(text: &str, stream: bool) -> ChatCommand {
        ChatCommand {
            user_id: "user-1".to_string(),
            messages: vec![Message::user(text)],
            category: "chat".to_string(),
            provider: None,
            stream,
        }
    }

    async fn wait_for_stored(cache: &ExchangeCacheService, expected: usize) -> bool {
        for _ in 0..100 {
            if cache.count().await.unwrap() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn collect(reply: ChatReply) -> Vec<Result<String, DomainError>> {
        match reply {
            ChatReply::Stream(stream) => stream.collect().await,
            ChatReply::Complete(answer) => panic!("expected a stream, got {:?}", answer),
        }
    }

    fn complete(reply: ChatReply) -> ChatAnswer {
        match reply {
            ChatReply::Complete(answer) => answer,
            ChatReply::Stream(_) => panic!("expected a complete answer"),
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_prompt() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply("x"));

        let result = fixture.service.chat(command("   ", false)).await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert_eq!(fixture.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejects_long_prompt() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply("x"));

        let ok = fixture.service.chat(command(&"a".repeat(5000), false)).await;
        assert!(ok.is_ok());

        let too_long = fixture.service.chat(command(&"a".repeat(5001), false)).await;
        assert!(matches!(too_long, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_miss_generates_then_second_call_is_cached() {
        let fixture = create_service(
            MockLlmProvider::new("google")
                .with_reply("(Note: draft) Use  flexbox.")
                .with_usage(Usage::new(5, 7)),
        );

        let first = complete(fixture.service.chat(command("How do I center a div", false)).await.unwrap());
        assert_eq!(first.response, "Use flexbox.");
        assert_eq!(first.tokens_used, Some(12));
        assert!(!first.cached);

        assert!(wait_for_stored(&fixture.cache, 1).await);

        let second = complete(
            fixture
                .service
                .chat(command("  how do i center a DIV ", false))
                .await
                .unwrap(),
        );
        assert!(second.cached);
        assert_eq!(second.response, "Use flexbox.");
        assert_eq!(second.tokens_used, Some(12));
        assert_eq!(fixture.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_provider_error_and_not_stored() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply(""));

        let result = fixture.service.chat(command("hello", false)).await;
        assert!(matches!(result, Err(DomainError::Provider { .. })));

        let notes_only = create_service(MockLlmProvider::new("google").with_reply("(Note: draft)"));
        let result = notes_only.service.chat(command("hello", false)).await;
        assert!(matches!(result, Err(DomainError::Provider { .. })));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fixture.cache.count().await.unwrap(), 0);
        assert_eq!(notes_only.cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tokens_estimated_without_usage() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply("abcde"));

        let answer = complete(fixture.service.chat(command("q", false)).await.unwrap());

        assert_eq!(answer.tokens_used, Some(6));
    }

    #[tokio::test]
    async fn test_request_carries_conversation_and_settings() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply("ok"));

        let mut cmd = command("second question", false);
        cmd.messages = vec![
            Message::user("first question"),
            Message::assistant(""),
            Message::assistant("first answer"),
            Message::user("second question"),
        ];
        fixture.service.chat(cmd).await.unwrap();

        let request = fixture.provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.max_tokens, Some(300));
        assert_eq!(request.temperature, Some(0.7));
        assert!(request.system.is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply("x"));

        let mut cmd = command("q", false);
        cmd.provider = Some(ProviderKind::Groq);

        let result = fixture.service.chat(cmd).await;
        assert!(matches!(result, Err(DomainError::ProviderNotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_provider_quota_error_is_returned() {
        let fixture = create_service(
            MockLlmProvider::new("google").with_error(DomainError::quota_exceeded("google")),
        );

        let result = fixture.service.chat(command("q", true)).await;
        assert!(matches!(result, Err(DomainError::QuotaExceeded { .. })));
    }

    #[tokio::test]
    async fn test_stream_is_stored_after_completion() {
        let fixture = create_service(
            MockLlmProvider::new("google")
                .with_reply("Closures capture their scope.")
                .with_usage(Usage::new(3, 4)),
        );

        let reply = fixture.service.chat(command("What is a closure", true)).await.unwrap();
        let text: String = collect(reply).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text, "Closures capture their scope.");

        assert!(wait_for_stored(&fixture.cache, 1).await);
        let hit = fixture
            .cache
            .lookup("what is a closure", "chat", Some("user-1"))
            .await
            .unwrap();
        assert_eq!(hit.exchange.response, "Closures capture their scope.");
        assert_eq!(hit.exchange.tokens_used, Some(7));
    }

    #[tokio::test]
    async fn test_stream_error_is_forwarded_and_not_stored() {
        let fixture = create_service(
            MockLlmProvider::new("google")
                .with_reply("partial answer here")
                .with_stream_error(DomainError::unavailable("reset")),
        );

        let reply = fixture.service.chat(command("q", true)).await.unwrap();
        let items = collect(reply).await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fixture.cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_stream_ends_with_provider_error() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply(""));

        let reply = fixture.service.chat(command("q", true)).await.unwrap();
        let items = collect(reply).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(DomainError::Provider { .. })));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fixture.cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_client_disconnect_stores_nothing() {
        let long_reply = "word ".repeat(200);
        let fixture = create_service(MockLlmProvider::new("google").with_reply(long_reply));

        let reply = fixture.service.chat(command("q", true)).await.unwrap();
        match reply {
            ChatReply::Stream(mut stream) => {
                assert!(stream.next().await.is_some());
                drop(stream);
            }
            ChatReply::Complete(_) => panic!("expected a stream"),
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fixture.cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider_for_streaming_request() {
        let fixture = create_service(MockLlmProvider::new("google").with_reply("fresh"));
        fixture
            .cache
            .store(NewExchange::new("q", "cached", "chat").with_user("user-1"))
            .await
            .unwrap();

        let answer = complete(fixture.service.chat(command("Q", true)).await.unwrap());

        assert!(answer.cached);
        assert_eq!(answer.response, "cached");
        assert_eq!(fixture.provider.calls(), 0);
    }
}
