//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the identity store

use crate::state::GatewayState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Always 200, never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Runs `SELECT 1` against the identity store. HTTP 200 when it answers,
/// HTTP 503 otherwise. The control plane and object store are not probed:
/// both need per-user context.
pub async fn readyz(State(state): State<GatewayState>) -> impl IntoResponse {
    let identity_check = match sqlx::query("SELECT 1").execute(&*state.auth.db).await {
        Ok(_) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(format!("error: {}", e)),
        },
    };

    let overall_ok = identity_check.ok;
    let mut checks = HashMap::new();
    checks.insert("identity_store", identity_check);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
