use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::assistant;
use super::health;
use super::middleware::{metrics_middleware, USER_ID_HEADER};
use super::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(assistant::chat))
        .route("/ai/summary", post(assistant::summarize))
}

/// Full router with health checks, the assistant API and request middleware
pub fn create_router_with_state(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/api", api_router())
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Allow browser calls from the listed origins; no layer when empty
pub fn with_cors(router: Router, origins: &[String]) -> Router {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return router;
    }

    router.layer(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(USER_ID_HEADER),
            ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::domain::chat::AssistantConfig;
    use crate::domain::exchange::{CachedExchange, ExchangeCacheConfig, NewExchange};
    use crate::domain::llm::{MockLlmProvider, ProviderKind};
    use crate::domain::DomainError;
    use crate::infrastructure::exchange::StorageExchangeRepository;
    use crate::infrastructure::llm::ProviderRegistry;
    use crate::infrastructure::services::{
        ChatService, ExchangeCacheService, SummaryService,
    };
    use crate::infrastructure::storage::InMemoryStorage;

    struct TestApp {
        router: Router,
        cache: Arc<ExchangeCacheService>,
        provider: Arc<MockLlmProvider>,
    }

    fn test_app(provider: MockLlmProvider) -> TestApp {
        let storage = InMemoryStorage::<CachedExchange>::new();
        let repository = StorageExchangeRepository::new(Arc::new(storage));
        let cache = Arc::new(ExchangeCacheService::with_config(
            Arc::new(repository),
            ExchangeCacheConfig::default().with_backoff_base_ms(1),
        ));

        let provider = Arc::new(provider);
        let providers = ProviderRegistry::new()
            .with_provider(ProviderKind::Google, provider.clone())
            .with_provider(ProviderKind::Groq, provider.clone());
        let config = AssistantConfig::default();

        let state = AppState::new(
            Arc::new(ChatService::new(cache.clone(), providers.clone(), config.clone())),
            Arc::new(SummaryService::new(providers.clone(), config)),
            cache.clone(),
            providers,
        );

        TestApp {
            router: create_router_with_state(state),
            cache,
            provider,
        }
    }

    fn post(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn chat_body(text: &str, stream: bool) -> Value {
        json!({
            "messages": [{"role": "user", "content": text}],
            "category": "chat",
            "stream": stream
        })
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

    #[tokio::test]
    async fn test_live_and_health() {
        let app = test_app(MockLlmProvider::new("mock"));

        let live = app.router.clone().oneshot(get_request("/live")).await.unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let health = app.router.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_json(health).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_store_and_providers() {
        let app = test_app(MockLlmProvider::new("mock"));

        let response = app.router.oneshot(get_request("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"][0]["name"], "exchange_store");
        assert_eq!(json["checks"][1]["message"], "google,groq");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = test_app(MockLlmProvider::new("mock"));

        let response = app.router.oneshot(get_request("/live")).await.unwrap();
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_chat_requires_user() {
        let app = test_app(MockLlmProvider::new("mock").with_reply("hi"));

        let response = app
            .router
            .oneshot(post("/api/chat", None, chat_body("hello", false)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_prompt() {
        let app = test_app(MockLlmProvider::new("mock").with_reply("hi"));

        let response = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), chat_body("   ", false)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_rejects_unknown_provider() {
        let app = test_app(MockLlmProvider::new("mock").with_reply("hi"));
        let mut body = chat_body("hello", false);
        body["provider"] = json!("openai");

        let response = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["param"], "provider");
    }

    #[tokio::test]
    async fn test_chat_json_miss_then_hit() {
        let app = test_app(MockLlmProvider::new("mock").with_reply("Use a flex container."));

        let first = app
            .router
            .clone()
            .oneshot(post("/api/chat", Some("user-1"), chat_body("How do I center?", false)))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let json = body_json(first).await;
        assert_eq!(json["data"]["response"], "Use a flex container.");
        assert_eq!(json["data"]["cached"], false);
        assert!(json["data"]["tokensUsed"].is_number());

        assert!(wait_for_stored(&app.cache, 1).await);

        let second = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), chat_body("how do i  CENTER?", false)))
            .await
            .unwrap();

        let json = body_json(second).await;
        assert_eq!(json["data"]["cached"], true);
        assert_eq!(json["data"]["response"], "Use a flex container.");
        assert_eq!(app.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_chat_stream_emits_deltas_then_done() {
        let app = test_app(MockLlmProvider::new("mock").with_reply("hello there"));

        let response = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), chat_body("greet me", true)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let text = body_text(response).await;
        assert!(text.contains(r#""delta":"hello ""#));
        assert!(text.contains(r#""delta":"there""#));
        assert!(text.trim_end().ends_with("data: [DONE]"));

        assert!(wait_for_stored(&app.cache, 1).await);
    }

    #[tokio::test]
    async fn test_chat_stream_error_event() {
        let app = test_app(
            MockLlmProvider::new("mock")
                .with_reply("partial answer here")
                .with_stream_error(DomainError::unavailable("connection reset")),
        );

        let response = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), chat_body("explain", true)))
            .await
            .unwrap();

        let text = body_text(response).await;
        assert!(text.contains("event: error"));
        assert!(text.contains("AI_SERVICE_ERROR"));
        assert!(text.contains("[DONE]"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(app.cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chat_quota_error_status() {
        let app = test_app(
            MockLlmProvider::new("mock").with_error(DomainError::quota_exceeded("google")),
        );

        let response = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), chat_body("hello", true)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(response).await["error"]["code"], "QUOTA_EXCEEDED");
    }

    #[tokio::test]
    async fn test_cached_answer_served_for_stream_request() {
        let app = test_app(MockLlmProvider::new("mock").with_reply("unused"));
        app.cache
            .store(
                NewExchange::new("what is rust?", "A systems language.", "chat")
                    .with_user("user-1")
                    .with_tokens_used(5),
            )
            .await
            .unwrap();

        let response = app
            .router
            .oneshot(post("/api/chat", Some("user-1"), chat_body("What is Rust?", true)))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["data"]["cached"], true);
        assert_eq!(json["data"]["tokensUsed"], 5);
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_summary_endpoint() {
        let app = test_app(MockLlmProvider::new("mock").with_reply(
            r#"{"summary":["Build a study app","Team of 3","Weekly sync"],"tags":["React","Supabase"]}"#,
        ));

        let response = app
            .router
            .oneshot(post(
                "/api/ai/summary",
                Some("user-1"),
                json!({"content": "We are building a study app with React and Supabase."}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["summary"].as_array().unwrap().len(), 3);
        assert_eq!(json["data"]["tags"], json!(["React", "Supabase"]));
    }

    #[tokio::test]
    async fn test_summary_failure_still_answers() {
        let app = test_app(
            MockLlmProvider::new("mock").with_error(DomainError::provider("groq", "boom")),
        );

        let response = app
            .router
            .oneshot(post("/api/ai/summary", Some("user-1"), json!({"content": "text"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["tags"], json!([]));
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_format() {
        let app = test_app(MockLlmProvider::new("mock"));

        let response = app
            .router
            .oneshot(post("/api/ai/summary", Some("user-1"), json!({"text": 1})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn test_cors_preflight_for_allowed_origin() {
        let app = test_app(MockLlmProvider::new("mock"));
        let router = with_cors(app.router, &["http://localhost:3000".to_string()]);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }
}
