use serde::Deserialize;
use std::fmt;

/// Static access/secret key pair owned by the control plane.
///
/// Fetched fresh for every storage operation and never persisted.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ObjectStoreCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl ObjectStoreCredentials {
    /// Both halves present; an empty half is treated as "not provisioned".
    pub fn is_complete(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
