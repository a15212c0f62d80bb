//! Post summary and tag generation

use std::time::Instant;

use tracing::{debug, warn};

use crate::domain::chat::{parse_summary, AssistantConfig, PostSummary};
use crate::domain::{LlmRequest, ProviderKind};
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

const SUMMARY_SYSTEM_PROMPT: &str = "You analyze project posts and extract a summary and technology tags. \
Respond with valid JSON only.";

fn summary_prompt(content: &str) -> String {
    format!(
        "Analyze the following post and respond in this JSON format:\n\
{{\n  \"summary\": [\"line 1\", \"line 2\", \"line 3\"],\n  \"tags\": [\"tech1\", \"tech2\", \"tech3\", \"tech4\", \"tech5\"]\n}}\n\n\
Requirements:\n\
- summary: the core of the post in 3 independent sentences, each under 50 characters\n\
- tags: 5 technologies or tools mentioned in the post (languages, frameworks, libraries, tools)\n\
- Return pure JSON only, with no explanation and no markdown code fences.\n\n\
Post:\n{}",
        content
    )
}

/// Summarizes posts with the Groq JSON mode
#[derive(Debug, Clone)]
pub struct SummaryService {
    providers: ProviderRegistry,
    config: AssistantConfig,
}

impl SummaryService {
    pub fn new(providers: ProviderRegistry, config: AssistantConfig) -> Self {
        Self { providers, config }
    }

    /// Summarize a post into three lines and up to five tags
    ///
    /// Never fails: any provider or parsing problem yields
    /// [`PostSummary::unavailable`].
    pub async fn summarize(&self, content: &str) -> PostSummary {
        let provider = match self.providers.get(ProviderKind::Groq) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(error = %e, "Summary provider unavailable, returning default");
                return PostSummary::unavailable();
            }
        };

        let excerpt: String = content.chars().take(self.config.summary_input_chars).collect();
        if excerpt.trim().is_empty() {
            return PostSummary::unavailable();
        }

        let request = LlmRequest::builder()
            .system(SUMMARY_SYSTEM_PROMPT)
            .user(summary_prompt(&excerpt))
            .temperature(self.config.temperature)
            .max_tokens(self.config.summary_max_tokens)
            .json_output()
            .build();

        let model = provider.default_model().to_string();
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

        match result {
            Ok(response) => {
                debug!(chars = response.content().len(), "Summary generated");
                parse_summary(response.content())
            }
            Err(e) => {
                warn!(error = %e, "Summary generation failed, returning default");
                PostSummary::unavailable()
            }
        }
    }
}

/// Trait for summary operations
#[async_trait::async_trait]
pub trait SummaryServiceTrait: Send + Sync + std::fmt::Debug {
    async fn summarize(&self, content: &str) -> PostSummary;
}

#[async_trait::async_trait]
impl SummaryServiceTrait for SummaryService {
    async fn summarize(&self, content: &str) -> PostSummary {
        SummaryService::summarize(self, content).await
    }
}
