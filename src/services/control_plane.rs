//! HTTP client for the control-plane API that owns tenants, object-store
//! users and their credentials.

use crate::{config::ControlPlaneConfig, models::account::ListEnvelope};
use anyhow::{Context, bail};
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Url, header};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Upstream bodies echoed into error messages are cut to this many chars.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("control plane returned {status} for `{endpoint}`: {body}")]
    UpstreamStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("control plane request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("control plane response could not be decoded: {0}")]
    Decode(String),
    #[error("no object-store credentials provisioned for `{0}`")]
    NoCredentialsProvisioned(String),
}

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Shared control-plane client.
///
/// Carries the process-wide service-account token; cloning is cheap and every
/// clone shares one connection pool.
#[derive(Clone)]
pub struct ControlPlaneClient {
    http: Client,
    base_url: Arc<Url>,
    api_token: Arc<str>,
}

impl ControlPlaneClient {
    pub fn new(cfg: &ControlPlaneConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&cfg.base_url)
            .with_context(|| format!("parsing control_plane.base_url `{}`", cfg.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("control_plane.base_url `{}` cannot carry a path", cfg.base_url);
        }

        let http = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .context("building control plane HTTP client")?;

        Ok(Self {
            http,
            base_url: Arc::new(base_url),
            api_token: Arc::from(cfg.api_token.as_str()),
        })
    }

    /// Append percent-encoded `segments` to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = (*self.base_url).clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(segments))
            .bearer_auth(&*self.api_token)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// GET a `{"result": [...]}` listing and return its entries.
    pub async fn list<T: DeserializeOwned>(&self, segments: &[&str]) -> ControlPlaneResult<Vec<T>> {
        let body = self.send(self.request(Method::GET, segments), segments).await?;
        let envelope: ListEnvelope<T> = serde_json::from_slice(&body).map_err(|err| {
            ControlPlaneError::Decode(format!("`{}`: {}", segments.join("/"), err))
        })?;
        Ok(envelope.result)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        payload: &B,
    ) -> ControlPlaneResult<Bytes> {
        self.send(self.request(Method::POST, segments).json(payload), segments)
            .await
    }

    pub async fn delete(&self, segments: &[&str]) -> ControlPlaneResult<Bytes> {
        self.send(self.request(Method::DELETE, segments), segments)
            .await
    }

    /// Send the request and return the raw body, failing on any non-2xx status.
    async fn send(&self, request: RequestBuilder, segments: &[&str]) -> ControlPlaneResult<Bytes> {
        let endpoint = segments.join("/");
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            "control plane call"
        );

        if !status.is_success() {
            return Err(ControlPlaneError::UpstreamStatus {
                endpoint,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body)
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect(),
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
pub(crate) fn client_for(base_url: &str) -> ControlPlaneClient {
    ControlPlaneClient::new(&ControlPlaneConfig {
        base_url: base_url.into(),
        api_token: "svc-token".into(),
        ..ControlPlaneConfig::default()
    })
    .expect("control plane client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::Tenant;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let client = client_for("https://api.example.test/v2");
        let url = client.endpoint(&["s3", "users", "id with/slash", "credentials"]);
        assert_eq!(
            url.as_str(),
            "https://api.example.test/v2/s3/users/id%20with%2Fslash/credentials"
        );
    }

    #[tokio::test]
    async fn list_sends_service_token_and_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(header("authorization", "Bearer svc-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"id": "p-1", "name": "main", "status": "ACTIVE"}],
                "count": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tenants: Vec<Tenant> = client_for(&server.uri())
            .list(&["projects"])
            .await
            .expect("tenants");
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].id, "p-1");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .delete(&["s3", "users", "u-1"])
            .await
            .expect_err("403 must fail");
        match err {
            ControlPlaneError::UpstreamStatus { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_listing_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .list::<Tenant>(&["projects"])
            .await
            .expect_err("html is not json");
        assert!(matches!(err, ControlPlaneError::Decode(_)));
    }
}
