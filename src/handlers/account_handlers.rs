//! `/create-user` and `/delete-user`.
//!
//! Both take `{"login": ...}`, authenticate the caller as that login, and
//! relay the control plane's raw response body base64-encoded under
//! `message`.

use crate::{
    errors::AppError, handlers::auth::authenticate, models::account::AccountRequest,
    models::bucket::BucketName, state::GatewayState,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub message: String,
}

impl AccountResponse {
    fn from_upstream(body: &[u8]) -> Self {
        Self {
            message: general_purpose::STANDARD.encode(body),
        }
    }
}

/// Decode the JSON body and require a non-empty login.
fn parse_account_request(body: &[u8]) -> Result<String, AppError> {
    let request: AccountRequest =
        serde_json::from_slice(body).map_err(|_| AppError::bad_request("Invalid request body"))?;
    if request.login.is_empty() {
        return Err(AppError::bad_request("Invalid input"));
    }
    Ok(request.login)
}

/// `POST /create-user` -> 201
pub async fn create_user(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let login = parse_account_request(&body)?;
    // The account comes with a default bucket, so the login must name one.
    BucketName::for_login(&login)?;
    authenticate(&state, &headers, &login).await?;

    let upstream = state.accounts.create_account(&login).await?;
    Ok((
        StatusCode::CREATED,
        Json(AccountResponse::from_upstream(&upstream)),
    ))
}

/// `DELETE /delete-user` -> 202
pub async fn delete_user(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let login = parse_account_request(&body)?;
    authenticate(&state, &headers, &login).await?;

    let upstream = state.accounts.delete_account(&login).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AccountResponse::from_upstream(&upstream)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_body_requires_a_login() {
        assert_eq!(
            parse_account_request(br#"{"login":"alice"}"#).ok().as_deref(),
            Some("alice")
        );
        for body in [&b""[..], b"{", b"null", br#"{"login":42}"#] {
            let err = parse_account_request(body).unwrap_err();
            assert_eq!(err.message, "Invalid request body", "{body:?}");
        }
        // serde reads a JSON array as a struct's fields in order.
        for body in [&b"{}"[..], br#"{"login":""}"#, b"[]"] {
            let err = parse_account_request(body).unwrap_err();
            assert_eq!(err.message, "Invalid input");
        }
    }

    #[test]
    fn upstream_body_is_base64_encoded() {
        let response = AccountResponse::from_upstream(br#"{"id":"u-1"}"#);
        assert_eq!(response.message, "eyJpZCI6InUtMSJ9");
    }
}
