//! Chat and post-summary endpoints

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, ChatRequestBody, DataResponse, Json, SummaryRequestBody};
use crate::domain::chat::PostSummary;
use crate::infrastructure::services::{ChatCommand, ChatReply, ChatStream};

/// Terminal SSE payload
pub const STREAM_DONE: &str = "[DONE]";

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(body): Json<ChatRequestBody>,
) -> Result<Response, ApiError> {
    let provider = body.provider_kind()?;

    info!(
        user_id = %user_id,
        category = %body.category,
        stream = body.stream,
        messages = body.messages.len(),
        "Processing chat request"
    );

    let command = ChatCommand {
        user_id,
        messages: body.domain_messages(),
        category: body.category,
        provider,
        stream: body.stream,
    };

    match state.chat_service.chat(command).await? {
        ChatReply::Complete(answer) => Ok(Json(DataResponse::new(answer)).into_response()),
        ChatReply::Stream(stream) => Ok(Sse::new(sse_events(stream))
            .keep_alive(KeepAlive::default())
            .into_response()),
    }
}

/// Deltas as `{"type":"text-delta","delta":..}`, a failure as an `error`
/// event, then `[DONE]`
fn sse_events(stream: ChatStream) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream
        .map(|item| {
            let event = match item {
                Ok(delta) => Event::default()
                    .data(json!({"type": "text-delta", "delta": delta}).to_string()),
                Err(e) => {
                    warn!(error = %e, "Chat stream ended with an error");
                    let api_error = ApiError::from(e);
                    let body = serde_json::to_string(&api_error.response)
                        .unwrap_or_else(|_| String::from("{}"));
                    Event::default().event("error").data(body)
                }
            };
            Ok(event)
        })
        .chain(stream::once(async { Ok(Event::default().data(STREAM_DONE)) }))
}

/// POST /api/ai/summary
///
/// Always answers 200; a failed generation yields the "unavailable" summary.
pub async fn summarize(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(body): Json<SummaryRequestBody>,
) -> Result<Json<DataResponse<PostSummary>>, ApiError> {
    info!(user_id = %user_id, chars = body.content.chars().count(), "Summarizing post");

    let summary = state.summary_service.summarize(&body.content).await;
    Ok(Json(DataResponse::new(summary)))
}
