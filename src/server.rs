//! Listeners: the TLS API listener plus the plain-HTTP redirector, or a
//! single plain-HTTP API listener in `plain_http` mode.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use axum_server::tls_rustls::RustlsConfig;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;

/// Bind `host:port`, falling back to loopback when a wildcard bind is
/// refused.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", host, port);
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == ErrorKind::PermissionDenied && matches!(host, "0.0.0.0" | "::") => {
            let fallback_addr = format!("127.0.0.1:{}", port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr)
                .await
                .with_context(|| format!("binding {}", fallback_addr))
        }
        Err(err) => Err(err).with_context(|| format!("binding {}", addr)),
    }
}

/// Router that answers every request with a 301 to the same path and query
/// under `origin`.
pub fn redirect_router(origin: impl Into<String>) -> Router {
    let origin: Arc<str> = Arc::from(origin.into());
    Router::new().fallback(redirect_to_https).with_state(origin)
}

async fn redirect_to_https(State(origin): State<Arc<str>>, uri: Uri) -> Response {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match HeaderValue::from_str(&format!("{}{}", origin, path_and_query)) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Serve `app` until either listener fails.
pub async fn serve(cfg: &ServerConfig, app: Router) -> Result<()> {
    if cfg.plain_http {
        let listener = bind(&cfg.host, cfg.http_port).await?;
        tracing::warn!("TLS disabled; serving the API over plain HTTP");
        tracing::info!("Server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        return Ok(());
    }

    let tls = RustlsConfig::from_pem_file(&cfg.tls_cert, &cfg.tls_key)
        .await
        .with_context(|| {
            format!(
                "loading TLS certificate {} and key {}",
                cfg.tls_cert.display(),
                cfg.tls_key.display()
            )
        })?;

    let https_listener = bind(&cfg.host, cfg.https_port).await?.into_std()?;
    let redirect_listener = bind(&cfg.host, cfg.http_port).await?;
    tracing::info!("Server listening on https://{}", https_listener.local_addr()?);
    tracing::info!(
        "Redirecting http://{} to {}",
        redirect_listener.local_addr()?,
        cfg.https_origin()
    );

    let https = axum_server::from_tcp_rustls(https_listener, tls).serve(app.into_make_service());
    let redirect = axum::serve(redirect_listener, redirect_router(cfg.https_origin()));

    tokio::try_join!(
        async { https.await.context("https listener") },
        async { redirect.await.context("redirect listener") },
    )?;
    Ok(())
}
