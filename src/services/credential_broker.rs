use crate::{
    models::credentials::ObjectStoreCredentials,
    services::{
        control_plane::{ControlPlaneClient, ControlPlaneError, ControlPlaneResult},
        identity_resolver::IdentityResolver,
    },
};
use tracing::instrument;

/// Exchanges a login for the object-store key pair the control plane holds
/// for it.
#[derive(Clone)]
pub struct CredentialBroker {
    client: ControlPlaneClient,
    resolver: IdentityResolver,
}

impl CredentialBroker {
    pub fn new(client: ControlPlaneClient, resolver: IdentityResolver) -> Self {
        Self { client, resolver }
    }

    /// Resolve the user, then take the first credential pair listed for it.
    ///
    /// An empty list or a pair with an empty half is
    /// `NoCredentialsProvisioned`.
    #[instrument(skip(self))]
    pub async fn get_keys(&self, login: &str) -> ControlPlaneResult<ObjectStoreCredentials> {
        let user_id = self.resolver.resolve_user_id(login).await?;
        let pairs: Vec<ObjectStoreCredentials> = self
            .client
            .list(&["s3", "users", &user_id, "credentials"])
            .await?;

        match pairs.into_iter().next() {
            Some(pair) if pair.is_complete() => Ok(pair),
            _ => Err(ControlPlaneError::NoCredentialsProvisioned(login.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::control_plane::client_for;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn broker_with_user(server: &MockServer) -> CredentialBroker {
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"id": "p-1", "name": "main"}], "count": 1
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/p-1/s3/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"id": "u-1", "name": "alice"}], "count": 1
            })))
            .mount(server)
            .await;

        let client = client_for(&server.uri());
        CredentialBroker::new(client.clone(), IdentityResolver::new(client, None))
    }

    #[tokio::test]
    async fn first_credential_pair_is_returned() {
        let server = MockServer::start().await;
        let broker = broker_with_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/s3/users/u-1/credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"access_key": "AK1", "secret_key": "SK1"},
                    {"access_key": "AK2", "secret_key": "SK2"}
                ],
                "count": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let keys = broker.get_keys("alice").await.expect("keys");
        assert_eq!(keys.access_key, "AK1");
        assert_eq!(keys.secret_key, "SK1");
    }

    #[tokio::test]
    async fn unknown_login_never_reaches_credentials_endpoint() {
        let server = MockServer::start().await;
        let broker = broker_with_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/s3/users/u-1/credentials"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(matches!(
            broker.get_keys("mallory").await,
            Err(ControlPlaneError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_or_partial_credentials_are_not_provisioned() {
        let server = MockServer::start().await;
        let broker = broker_with_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/s3/users/u-1/credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [], "count": 0
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s3/users/u-1/credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"access_key": "AK1", "secret_key": ""}], "count": 1
            })))
            .mount(&server)
            .await;

        for _ in 0..2 {
            assert!(matches!(
                broker.get_keys("alice").await,
                Err(ControlPlaneError::NoCredentialsProvisioned(_))
            ));
        }
    }
}
