//! Caller identity forwarded by the upstream auth layer

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::types::ApiError;

/// Header carrying the authenticated user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated caller
///
/// Session validation happens upstream; this only reads the id the
/// gateway forwards and rejects requests that arrive without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireUser(pub String);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = extract_user_id(&parts.headers)?;
        debug!(user_id = %user_id, "Caller identified");
        Ok(RequireUser(user_id))
    }
}

pub fn extract_user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::unauthorized("Login required"))?;

    let user_id = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid user id header"))?
        .trim();

    if user_id.is_empty() {
        return Err(ApiError::unauthorized("Login required"));
    }

    Ok(user_id.to_string())
}
