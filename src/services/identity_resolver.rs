//! Resolves the tenant and the per-login object-store user id through the
//! control plane. Nothing is cached: every call re-lists tenants and users.

use crate::{
    models::account::{ObjectStoreUser, Tenant},
    services::control_plane::{ControlPlaneClient, ControlPlaneError, ControlPlaneResult},
};
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct IdentityResolver {
    client: ControlPlaneClient,
    /// Configured tenant name; `None` means "the first tenant listed".
    tenant: Option<Arc<str>>,
}

impl IdentityResolver {
    pub fn new(client: ControlPlaneClient, tenant: Option<String>) -> Self {
        Self {
            client,
            tenant: tenant.map(Arc::from),
        }
    }

    /// Id of the tenant every account lives in.
    #[instrument(skip(self))]
    pub async fn resolve_tenant_id(&self) -> ControlPlaneResult<String> {
        let tenants: Vec<Tenant> = self.client.list(&["projects"]).await?;
        select_tenant(tenants, self.tenant.as_deref()).map(|tenant| tenant.id)
    }

    /// Id of the object-store user whose name equals `login` exactly.
    #[instrument(skip(self))]
    pub async fn resolve_user_id(&self, login: &str) -> ControlPlaneResult<String> {
        let tenant_id = self.resolve_tenant_id().await?;
        let users: Vec<ObjectStoreUser> = self
            .client
            .list(&["projects", &tenant_id, "s3", "users"])
            .await?;

        users
            .into_iter()
            .find(|user| user.name == login)
            .map(|user| user.id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("object-store user `{}`", login)))
    }
}

fn select_tenant(tenants: Vec<Tenant>, wanted: Option<&str>) -> ControlPlaneResult<Tenant> {
    match wanted {
        Some(name) => tenants
            .into_iter()
            .find(|tenant| tenant.name == name)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("tenant `{}`", name))),
        None => {
            if tenants.len() > 1 {
                warn!(
                    count = tenants.len(),
                    "control plane lists several tenants; using the first one (set control_plane.tenant to choose)"
                );
            }
            tenants
                .into_iter()
                .next()
                .ok_or_else(|| ControlPlaneError::NotFound("tenant".into()))
        }
    }
}
