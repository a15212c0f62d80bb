use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::StatusCode;
use std::pin::Pin;
use std::time::Duration;

use crate::domain::DomainError;

/// Stream type for HTTP responses
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DomainError>> + Send>>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError>;
}

/// Real HTTP client using reqwest
///
/// Errors are attributed to `provider` and classified by status: quota
/// responses become [`DomainError::QuotaExceeded`], server errors, timeouts
/// and connection failures become [`DomainError::Unavailable`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    provider: &'static str,
}

impl HttpClient {
    pub fn new(provider: &'static str) -> Result<Self, DomainError> {
        Self::with_timeout(provider, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(provider: &'static str, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, provider })
    }

    async fn send(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(self.provider, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.provider, status, &error_body));
        }

        Ok(response)
    }
}

/// Map a non-success status and its body to a domain error
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> DomainError {
    let lowered = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("quota")
        || lowered.contains("resource_exhausted")
    {
        return DomainError::quota_exceeded(provider);
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return DomainError::unavailable(format!("{} returned HTTP {}", provider, status));
    }

    DomainError::provider(provider, format!("HTTP {}: {}", status, truncate(body, 500)))
}

fn transport_error(provider: &str, error: &reqwest::Error) -> DomainError {
    if error.is_timeout() || error.is_connect() {
        DomainError::unavailable(format!("{} request failed: {}", provider, error))
    } else {
        DomainError::provider(provider, format!("Request failed: {}", error))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let response = self.send(url, headers, body).await?;

        response.json().await.map_err(|e| {
            DomainError::provider(self.provider, format!("Failed to parse response: {}", e))
        })
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError> {
        use futures::StreamExt;

        let response = self.send(url, headers, body).await?;
        let provider = self.provider;

        let stream = response
            .bytes_stream()
            .map(move |result| result.map_err(|e| transport_error(provider, &e)));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockHttpClient {
        responses: RwLock<HashMap<String, serde_json::Value>>,
        stream_responses: RwLock<HashMap<String, Vec<Bytes>>>,
        errors: RwLock<HashMap<String, DomainError>>,
        last_body: RwLock<Option<serde_json::Value>>,
        last_headers: RwLock<Vec<(String, String)>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, url: impl Into<String>, response: serde_json::Value) -> Self {
            self.responses.write().unwrap().insert(url.into(), response);
            self
        }

        pub fn with_stream_response(self, url: impl Into<String>, chunks: Vec<Bytes>) -> Self {
            self.stream_responses
                .write()
                .unwrap()
                .insert(url.into(), chunks);
            self
        }

        pub fn with_error(self, url: impl Into<String>, error: DomainError) -> Self {
            self.errors.write().unwrap().insert(url.into(), error);
            self
        }

        pub fn last_body(&self) -> Option<serde_json::Value> {
            self.last_body.read().unwrap().clone()
        }

        pub fn last_header(&self, name: &str) -> Option<String> {
            self.last_headers
                .read()
                .unwrap()
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        }

        fn record(&self, url: &str, headers: Vec<(&str, &str)>, body: &serde_json::Value) -> Result<(), DomainError> {
            *self.last_body.write().unwrap() = Some(body.clone());
            *self.last_headers.write().unwrap() = headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            match self.errors.read().unwrap().get(url) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl HttpClientTrait for MockHttpClient {
        async fn post_json(
            &self,
            url: &str,
            headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<serde_json::Value, DomainError> {
            self.record(url, headers, body)?;

            self.responses
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| DomainError::provider("mock", format!("No mock response for {}", url)))
        }

        async fn post_json_stream(
            &self,
            url: &str,
            headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<ByteStream, DomainError> {
            self.record(url, headers, body)?;

            let chunks = self
                .stream_responses
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_default();

            let stream = stream::iter(chunks.into_iter().map(Ok));
            Ok(Box::pin(stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_classify_rate_limit() {
        let error = classify_status("groq", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(error, DomainError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_classify_quota_in_body() {
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"Quota exceeded"}}"#;
        let error = classify_status("google", StatusCode::FORBIDDEN, body);
        assert!(matches!(error, DomainError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let error = classify_status("google", StatusCode::BAD_GATEWAY, "");
        assert!(error.is_transient());
    }

    #[test]
    fn test_classify_client_error() {
        let error = classify_status("groq", StatusCode::UNAUTHORIZED, "invalid api key");
        assert!(matches!(error, DomainError::Provider { .. }));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn test_post_json_sends_headers_and_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = HttpClient::new("test").unwrap();
        let result = client
            .post_json(
                &format!("{}/v1/chat", server.uri()),
                vec![("Authorization", "Bearer k")],
                &serde_json::json!({}),
            )
            .await
            .unwrap();

        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn test_post_json_maps_429_to_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = HttpClient::new("groq").unwrap();
        let result = client
            .post_json(&server.uri(), vec![], &serde_json::json!({}))
            .await;

        assert!(matches!(result, Err(DomainError::QuotaExceeded { provider }) if provider == "groq"));
    }

    #[tokio::test]
    async fn test_post_json_maps_503_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpClient::new("google").unwrap();
        let result = client
            .post_json(&server.uri(), vec![], &serde_json::json!({}))
            .await;

        assert!(result.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_post_json_stream_yields_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: hello\n\n"))
            .mount(&server)
            .await;

        let client = HttpClient::new("test").unwrap();
        let mut stream = client
            .post_json_stream(&server.uri(), vec![], &serde_json::json!({}))
            .await
            .unwrap();

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(String::from_utf8(body).unwrap(), "data: hello\n\n");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let client = HttpClient::new("test").unwrap();
        let result = client
            .post_json("http://127.0.0.1:1/", vec![], &serde_json::json!({}))
            .await;

        assert!(result.unwrap_err().is_transient());
    }
}
