//! Control-plane records: tenants (projects), object-store users and the
//! account-provisioning payload.

use serde::{Deserialize, Serialize};

/// Every control-plane listing is wrapped as `{"result": [...], "count": n}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// A billing/project scope in the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A quota attached to an object-store user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quota {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub kind: Option<String>,
    pub max_objects: Option<u64>,
    pub max_size: u64,
}

/// A per-login object-store account inside a tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreUser {
    pub id: String,
    /// Equal to the login the account was created for.
    pub name: String,
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub max_buckets: Option<u32>,
    #[serde(default)]
    pub quotas: Vec<Quota>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body POSTed to `projects/{tenant}/s3/users`.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount<'a> {
    pub bucket_quota: Quota,
    pub canonical_name: &'a str,
    pub default_bucket: bool,
    pub max_buckets: u32,
    pub name: &'a str,
    pub user_quota: Quota,
}

/// `{"login": ...}` body of `/create-user` and `/delete-user`.
#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    #[serde(default)]
    pub login: String,
}
