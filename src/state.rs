use crate::{
    config::AppConfig,
    services::{
        account_lifecycle::AccountLifecycle, auth_gate::AuthGate,
        control_plane::ControlPlaneClient, credential_broker::CredentialBroker,
        identity_resolver::IdentityResolver, object_store::ObjectStoreConnector,
        storage_gateway::StorageGateway,
    },
};
use anyhow::Result;
use sqlx::AnyPool;
use std::sync::Arc;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct GatewayState {
    pub auth: AuthGate,
    pub accounts: AccountLifecycle,
    pub storage: StorageGateway,
}

impl GatewayState {
    pub fn new(
        cfg: &AppConfig,
        identity_store: AnyPool,
        connector: Arc<dyn ObjectStoreConnector>,
    ) -> Result<Self> {
        let client = ControlPlaneClient::new(&cfg.control_plane)?;
        let resolver = IdentityResolver::new(client.clone(), cfg.control_plane.tenant.clone());

        Ok(Self {
            auth: AuthGate::new(identity_store),
            accounts: AccountLifecycle::new(
                client.clone(),
                resolver.clone(),
                cfg.control_plane.quotas.clone(),
            ),
            storage: StorageGateway::new(
                CredentialBroker::new(client, resolver),
                connector,
                cfg.object_store.delete_wait(),
            ),
        })
    }
}
