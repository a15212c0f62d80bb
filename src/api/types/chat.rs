//! Chat request and response bodies
//!
//! The web client has sent messages in three shapes over time: a plain
//! `content` string, a `parts` array of typed fragments, and a bare `text`
//! field. All of them are folded into domain [`Message`]s here so nothing
//! past the handler needs to know about the variants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::chat::DEFAULT_CATEGORY;
use crate::domain::llm::{Message, ProviderKind};

use super::error::ApiError;

/// `POST /api/chat` body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequestBody {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_stream() -> bool {
    true
}

impl ChatRequestBody {
    /// Provider named by the client, `None` when it left the choice to us
    pub fn provider_kind(&self) -> Result<Option<ProviderKind>, ApiError> {
        match self.provider.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => ProviderKind::from_str(name).map(Some).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown provider '{}'", name)).with_param("provider")
            }),
        }
    }

    pub fn domain_messages(&self) -> Vec<Message> {
        self.messages.iter().map(IncomingMessage::to_domain).collect()
    }
}

/// Message as received on the wire; fields are optional because each
/// client generation fills a different one
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
    #[serde(default)]
    pub text: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// The body a message resolved to, in precedence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Content(String),
    Parts(String),
    Text(String),
    Empty,
}

impl MessageBody {
    pub fn into_text(self) -> String {
        match self {
            Self::Content(text) | Self::Parts(text) | Self::Text(text) => text,
            Self::Empty => String::new(),
        }
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl IncomingMessage {
    /// A non-empty `content` string wins, then text parts, then `text`
    pub fn body(&self) -> MessageBody {
        if let Some(content) = non_empty_string(self.content.as_ref()) {
            return MessageBody::Content(content.to_string());
        }

        if let Some(parts) = &self.parts {
            let joined: String = parts
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_deref())
                .collect();
            if !joined.is_empty() {
                return MessageBody::Parts(joined);
            }
        }

        match non_empty_string(self.text.as_ref()) {
            Some(text) => MessageBody::Text(text.to_string()),
            None => MessageBody::Empty,
        }
    }

    /// Anything not sent by the user is replayed as assistant output
    pub fn to_domain(&self) -> Message {
        let text = self.body().into_text();
        if self.role == "user" {
            Message::user(text)
        } else {
            Message::assistant(text)
        }
    }
}

/// Every successful body is wrapped in `{"data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
