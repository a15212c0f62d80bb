//! Request and response bodies for the HTTP API

pub mod chat;
pub mod error;
pub mod json;
pub mod summary;

pub use chat::{ChatRequestBody, DataResponse, IncomingMessage, MessageBody, MessagePart};
pub use error::{codes, ApiError, ApiErrorResponse};
pub use json::Json;
pub use summary::SummaryRequestBody;
