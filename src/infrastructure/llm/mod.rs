//! LLM provider implementations

mod factory;
mod gemini;
mod groq;
mod http_client;
mod sse;

pub use factory::{LlmProviderFactory, ProviderKeys, ProviderRegistry};
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use http_client::{classify_status, ByteStream, HttpClient, HttpClientTrait};
pub use sse::{sse_events, SseDecoder};
