//! Creation and removal of a login's object-store account. Creating the
//! account also creates the login's default bucket on the control-plane side.

use crate::{
    config::QuotaConfig,
    models::account::{NewAccount, Quota},
    services::{
        control_plane::{ControlPlaneClient, ControlPlaneResult},
        identity_resolver::IdentityResolver,
    },
};
use bytes::Bytes;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct AccountLifecycle {
    client: ControlPlaneClient,
    resolver: IdentityResolver,
    quotas: QuotaConfig,
}

impl AccountLifecycle {
    pub fn new(client: ControlPlaneClient, resolver: IdentityResolver, quotas: QuotaConfig) -> Self {
        Self {
            client,
            resolver,
            quotas,
        }
    }

    /// Provision an account named `login` with a default bucket.
    ///
    /// Returns the raw upstream body; a non-2xx upstream status is an error.
    #[instrument(skip(self))]
    pub async fn create_account(&self, login: &str) -> ControlPlaneResult<Bytes> {
        let tenant_id = self.resolver.resolve_tenant_id().await?;
        let quota = Quota {
            kind: None,
            max_objects: Some(self.quotas.max_objects),
            max_size: self.quotas.max_size,
        };
        let payload = NewAccount {
            bucket_quota: quota.clone(),
            canonical_name: login,
            default_bucket: true,
            max_buckets: self.quotas.max_buckets,
            name: login,
            user_quota: quota,
        };

        let body = self
            .client
            .post_json(&["projects", &tenant_id, "s3", "users"], &payload)
            .await?;
        info!(login, tenant_id = %tenant_id, "object-store account created");
        Ok(body)
    }

    /// Remove the account whose name equals `login`.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, login: &str) -> ControlPlaneResult<Bytes> {
        let user_id = self.resolver.resolve_user_id(login).await?;
        let body = self.client.delete(&["s3", "users", &user_id]).await?;
        info!(login, user_id = %user_id, "object-store account deleted");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::control_plane::{ControlPlaneError, client_for};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    async fn lifecycle(server: &MockServer) -> AccountLifecycle {
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"id": "p-1", "name": "main"}], "count": 1
            })))
            .mount(server)
            .await;
        let client = client_for(&server.uri());
        AccountLifecycle::new(
            client.clone(),
            IdentityResolver::new(client, None),
            QuotaConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_posts_quota_payload_and_returns_raw_body() {
        let server = MockServer::start().await;
        let accounts = lifecycle(&server).await;
        Mock::given(method("POST"))
            .and(path("/projects/p-1/s3/users"))
            .and(body_json(json!({
                "bucket_quota": {"max_objects": 10, "max_size": 1000},
                "canonical_name": "alice",
                "default_bucket": true,
                "max_buckets": 10,
                "name": "alice",
                "user_quota": {"max_objects": 10, "max_size": 1000}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"u-1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let body = accounts.create_account("alice").await.expect("created");
        assert_eq!(&body[..], br#"{"id":"u-1"}"#);
    }

    #[tokio::test]
    async fn create_surfaces_upstream_rejection() {
        let server = MockServer::start().await;
        let accounts = lifecycle(&server).await;
        Mock::given(method("POST"))
            .and(path("/projects/p-1/s3/users"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already exists"))
            .mount(&server)
            .await;

        assert!(matches!(
            accounts.create_account("alice").await,
            Err(ControlPlaneError::UpstreamStatus { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn delete_resolves_user_then_deletes_by_id() {
        let server = MockServer::start().await;
        let accounts = lifecycle(&server).await;
        Mock::given(method("GET"))
            .and(path("/projects/p-1/s3/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"id": "u-9", "name": "alice"}], "count": 1
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/s3/users/u-9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let body = accounts.delete_account("alice").await.expect("deleted");
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn delete_of_unknown_login_sends_no_delete() {
        let server = MockServer::start().await;
        let accounts = lifecycle(&server).await;
        Mock::given(method("GET"))
            .and(path("/projects/p-1/s3/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [], "count": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(matches!(
            accounts.delete_account("alice").await,
            Err(ControlPlaneError::NotFound(_))
        ));
    }
}
