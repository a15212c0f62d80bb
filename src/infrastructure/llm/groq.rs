use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use super::sse::sse_events;
use crate::domain::llm::ResponseFormat;
use crate::domain::{
    DomainError, FinishReason, LlmProvider, LlmRequest, LlmResponse, LlmStream, Message,
    MessageRole, ProviderKind, StreamChunk, Usage,
};

const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai";
const PROVIDER: &str = "groq";

/// Groq provider speaking the OpenAI chat-completions dialect
#[derive(Debug)]
pub struct GroqProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> GroqProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_GROQ_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: ProviderKind::Groq.default_model().to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, model: &str, request: &LlmRequest) -> serde_json::Value {
        let mut messages: Vec<GroqMessage> = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(GroqMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(GroqMessage::from_domain));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": request.stream,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<LlmResponse, DomainError> {
        let response: GroqResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(PROVIDER, "No choices in response"))?;

        let message = Message::assistant(choice.message.content.unwrap_or_default());

        let mut llm_response = LlmResponse::new(response.id, response.model, message);

        if let Some(reason) = choice.finish_reason {
            llm_response = llm_response.with_finish_reason(FinishReason::parse(&reason));
        }

        if let Some(usage) = response.usage {
            llm_response = llm_response.with_usage(usage.into());
        }

        Ok(llm_response)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for GroqProvider<C> {
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
        let mut req = request;
        req.stream = false;

        let url = self.chat_completions_url();
        let body = self.build_request(model, &req);
        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    async fn chat_stream(
        &self,
        model: &str,
        request: LlmRequest,
    ) -> Result<LlmStream, DomainError> {
        let mut req = request;
        req.stream = true;

        let url = self.chat_completions_url();
        let body = self.build_request(model, &req);
        let byte_stream = self
            .client
            .post_json_stream(&url, self.headers(), &body)
            .await?;

        let model = model.to_string();
        let stream = sse_events(byte_stream).filter_map(move |event| {
            let chunk = match event {
                Ok(data) => parse_stream_event(&data, &model),
                Err(e) => Some(Err(e)),
            };
            async move { chunk }
        });

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

fn parse_stream_event(data: &str, model: &str) -> Option<Result<StreamChunk, DomainError>> {
    if data.trim() == "[DONE]" {
        return None;
    }

    let chunk = match serde_json::from_str::<GroqStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(DomainError::provider(
                PROVIDER,
                format!("Malformed stream event: {}", e),
            )));
        }
    };

    let mut stream_chunk = StreamChunk::new(chunk.id, chunk.model.unwrap_or_else(|| model.to_string()));

    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(delta) = choice.delta.content {
            stream_chunk = stream_chunk.with_delta(delta);
        }

        if let Some(reason) = choice.finish_reason {
            stream_chunk = stream_chunk.with_finish_reason(FinishReason::parse(&reason));
        }
    }

    // Groq reports stream usage under `x_groq`
    let usage = chunk.usage.or(chunk.x_groq.and_then(|x| x.usage));
    if let Some(usage) = usage {
        stream_chunk = stream_chunk.with_usage(usage.into());
    }

    Some(Ok(stream_chunk))
}

// Groq API types

#[derive(Debug, Serialize)]
struct GroqMessage {
    role: &'static str,
    content: String,
}

impl GroqMessage {
    fn from_domain(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        Self {
            role,
            content: message.content_text().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    id: String,
    model: String,
    choices: Vec<GroqChoice>,
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: Option<u32>,
}

impl From<GroqUsage> for Usage {
    fn from(usage: GroqUsage) -> Self {
        let mut converted = Usage::new(usage.prompt_tokens, usage.completion_tokens);
        if let Some(total) = usage.total_tokens {
            converted.total_tokens = total;
        }
        converted
    }
}

#[derive(Debug, Deserialize)]
struct GroqStreamChunk {
    #[serde(default)]
    id: String,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<GroqStreamChoice>,
    usage: Option<GroqUsage>,
    x_groq: Option<GroqExtension>,
}

#[derive(Debug, Deserialize)]
struct GroqExtension {
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqStreamChoice {
    delta: GroqDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqDelta {
    content: Option<String>,
}
