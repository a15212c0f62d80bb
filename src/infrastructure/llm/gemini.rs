//! Google Gemini provider (Generative Language API)

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

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER: &str = "google";

#[derive(Debug)]
pub struct GeminiProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> GeminiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_GEMINI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: ProviderKind::Google.default_model().to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-goog-api-key", self.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, request: &LlmRequest) -> serde_json::Value {
        // Gemini only knows "user" and "model" turns; system text goes to systemInstruction
        let mut system_parts: Vec<GeminiPart> = request
            .system
            .iter()
            .map(|text| GeminiPart { text: text.clone() })
            .collect();

        let mut contents: Vec<GeminiContent> = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            let part = GeminiPart {
                text: message.content_text().to_string(),
            };

            match message.role {
                MessageRole::System => system_parts.push(part),
                MessageRole::User => contents.push(GeminiContent::new("user", part)),
                MessageRole::Assistant => contents.push(GeminiContent::new("model", part)),
            }
        }

        let mut body = serde_json::json!({ "contents": contents });

        if !system_parts.is_empty() {
            body["systemInstruction"] = serde_json::json!({ "parts": system_parts });
        }

        let mut generation = serde_json::Map::new();
        if let Some(temp) = request.temperature {
            generation.insert("temperature".into(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = request.max_tokens {
            generation.insert("maxOutputTokens".into(), serde_json::json!(max_tokens));
        }
        if let Some(top_p) = request.top_p {
            generation.insert("topP".into(), serde_json::json!(top_p));
        }
        if request.response_format == ResponseFormat::JsonObject {
            generation.insert(
                "responseMimeType".into(),
                serde_json::json!("application/json"),
            );
        }
        if !generation.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(generation);
        }

        body
    }
}

/// Provider-neutral view of one generateContent response
struct Generated {
    id: String,
    model: String,
    text: String,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

fn convert_response(response: GeminiResponse, model: &str) -> Result<Generated, DomainError> {
    if let Some(feedback) = response.prompt_feedback.as_ref() {
        if let Some(ref reason) = feedback.block_reason {
            return Err(DomainError::provider(
                PROVIDER,
                format!("Prompt blocked: {}", reason),
            ));
        }
    }

    let (text, finish_reason) = match response.candidates.into_iter().next() {
        Some(candidate) => {
            let text = candidate
                .content
                .map(|content| {
                    content
                        .parts
                        .into_iter()
                        .filter_map(|part| part.text)
                        .collect::<String>()
                })
                .unwrap_or_default();
            (text, candidate.finish_reason.map(|r| FinishReason::parse(&r)))
        }
        None => (String::new(), None),
    };

    Ok(Generated {
        id: response.response_id.unwrap_or_default(),
        model: response.model_version.unwrap_or_else(|| model.to_string()),
        text,
        finish_reason,
        usage: response.usage_metadata.map(Usage::from),
    })
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for GeminiProvider<C> {
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
        let body = self.build_request(&request);
        let json = self
            .client
            .post_json(&self.generate_url(model), self.headers(), &body)
            .await?;

        let response: GeminiResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let generated = convert_response(response, model)?;

        if generated.text.is_empty() {
            let message = match &generated.finish_reason {
                Some(reason) => format!("Empty response (finish reason {:?})", reason),
                None => "No candidates in response".to_string(),
            };
            return Err(DomainError::provider(PROVIDER, message));
        }

        let mut llm_response = LlmResponse::new(
            generated.id,
            generated.model,
            Message::assistant(generated.text),
        );
        if let Some(reason) = generated.finish_reason {
            llm_response = llm_response.with_finish_reason(reason);
        }
        if let Some(usage) = generated.usage {
            llm_response = llm_response.with_usage(usage);
        }

        Ok(llm_response)
    }

    async fn chat_stream(
        &self,
        model: &str,
        request: LlmRequest,
    ) -> Result<LlmStream, DomainError> {
        let body = self.build_request(&request);
        let byte_stream = self
            .client
            .post_json_stream(&self.stream_url(model), self.headers(), &body)
            .await?;

        let model = model.to_string();
        let stream = sse_events(byte_stream).map(move |event| {
            let data = event?;
            let response: GeminiResponse = serde_json::from_str(&data).map_err(|e| {
                DomainError::provider(PROVIDER, format!("Malformed stream event: {}", e))
            })?;

            let generated = convert_response(response, &model)?;

            let mut chunk = StreamChunk::new(generated.id, generated.model);
            if !generated.text.is_empty() {
                chunk = chunk.with_delta(generated.text);
            }
            if let Some(reason) = generated.finish_reason {
                chunk = chunk.with_finish_reason(reason);
            }
            if let Some(usage) = generated.usage {
                chunk = chunk.with_usage(usage);
            }
            Ok(chunk)
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

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn new(role: &'static str, part: GeminiPart) -> Self {
        Self {
            role,
            parts: vec![part],
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
    response_id: Option<String>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    total_token_count: Option<u32>,
}

impl From<GeminiUsage> for Usage {
    fn from(usage: GeminiUsage) -> Self {
        let mut converted = Usage::new(usage.prompt_token_count, usage.candidates_token_count);
        if let Some(total) = usage.total_token_count {
            converted.total_tokens = total;
        }
        converted
    }
}
