use crate::services::{
    control_plane::ControlPlaneError, object_store::StorageError, storage_gateway::GatewayError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Every handler failure ends up here, so every request path terminates in a
/// response with a deterministic status.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    /// Shortcut for 502 Bad Gateway (control plane or object store failed)
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<ControlPlaneError> for AppError {
    fn from(err: ControlPlaneError) -> Self {
        match &err {
            ControlPlaneError::NotFound(_) => AppError::not_found(err.to_string()),
            ControlPlaneError::UpstreamStatus { .. }
            | ControlPlaneError::Transport(_)
            | ControlPlaneError::Decode(_)
            | ControlPlaneError::NoCredentialsProvisioned(_) => {
                tracing::error!(error = %err, "control plane call failed");
                AppError::bad_gateway(err.to_string())
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::ObjectNotFound { .. } => AppError::not_found(err.to_string()),
            StorageError::InvalidObjectKey(_) | StorageError::InvalidBucketName { .. } => {
                AppError::bad_request(err.to_string())
            }
            StorageError::Upstream(_) | StorageError::DeletionNotConfirmed { .. } => {
                tracing::error!(error = %err, "object store call failed");
                AppError::bad_gateway(err.to_string())
            }
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ControlPlane(err) => err.into(),
            GatewayError::Storage(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_things_map_to_not_found() {
        let err: AppError = StorageError::ObjectNotFound {
            bucket: "alice-default-bucket".into(),
            key: "a.txt".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: AppError = ControlPlaneError::NotFound("user `bob`".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        let err: AppError = GatewayError::ControlPlane(ControlPlaneError::UpstreamStatus {
            endpoint: "/projects".into(),
            status: 500,
            body: "boom".into(),
        })
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);

        let err: AppError = GatewayError::Storage(StorageError::Upstream("reset".into())).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn invalid_names_map_to_bad_request() {
        let err: AppError = StorageError::InvalidObjectKey("empty".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
