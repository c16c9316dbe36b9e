//! Defines routes for account and file operations.
//!
//! ## Structure
//! - **Account endpoints** (JSON body `{"login"}`)
//!   - `POST   /create-user`: provision an object-store account and default bucket
//!   - `DELETE /delete-user`: remove the account
//!
//! - **File endpoints** (caller's default bucket)
//!   - `POST   /upload-file`: multipart `username` + `file`
//!   - `GET    /download-file`: `?username=&filename=`
//!   - `DELETE /delete-file`: `?username=&filename=`
//!   - `GET    /list-files`: `?username=`
//!
//! Any other method on these paths is answered with 405 by the method router.

use crate::{
    handlers::{
        account_handlers::{create_user, delete_user},
        file_handlers::{delete_file, download_file, list_files, upload_file},
        health_handlers::{healthz, readyz},
    },
    state::GatewayState,
};
use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Request},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the router for every gateway route.
///
/// Uploads may carry up to `max_upload_bytes`; other routes keep axum's
/// default body limit.
pub fn routes(max_upload_bytes: usize) -> Router<GatewayState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Account routes
        .route("/create-user", post(create_user))
        .route("/delete-user", delete(delete_user))
        // File routes
        .route(
            "/upload-file",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/download-file", get(download_file))
        .route("/delete-file", delete(delete_file))
        .route("/list-files", get(list_files))
}

/// The complete application: routes, shared state and request tracing.
pub fn app(state: GatewayState, max_upload_bytes: usize) -> Router {
    routes(max_upload_bytes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tag each request with a fresh id, in its log span and the response.
async fn request_id_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("request", request_id = %request_id);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
