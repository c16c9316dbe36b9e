//! Bearer-token extraction and authentication shared by every API handler.

use crate::{errors::AppError, state::GatewayState};
use axum::http::{HeaderMap, header};
use tracing::warn;

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The header must split on single spaces into exactly two parts, the first
/// literally `Bearer` and the second non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Authorization header is required"))?;

    let invalid = || AppError::unauthorized("Invalid authorization header format");
    let value = value.to_str().map_err(|_| invalid())?;
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token),
        _ => Err(invalid()),
    }
}

/// Extract the bearer token and check it against the identity store for
/// `login`. No upstream call is made unless this succeeds.
pub async fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
    login: &str,
) -> Result<(), AppError> {
    let token = bearer_token(headers)?;
    if state.auth.validate(login, token).await {
        Ok(())
    } else {
        warn!(login, "authentication failed");
        Err(AppError::unauthorized("Failed to authenticate"))
    }
}
