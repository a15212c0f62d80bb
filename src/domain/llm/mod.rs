//! LLM provider domain models and traits

mod kind;
mod message;
mod provider;
mod request;
mod response;

pub use kind::ProviderKind;
pub use message::{last_user_text, Message, MessageRole};
pub use provider::{LlmProvider, LlmStream};
pub use request::{LlmRequest, LlmRequestBuilder, ResponseFormat};
pub use response::{FinishReason, LlmResponse, StreamChunk, Usage};

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
