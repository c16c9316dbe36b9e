//! Object keys and listing entries.

use crate::services::object_store::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An object key taken from caller input (upload filename or query string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Reject keys the object store would misinterpret or that smuggle path
    /// traversal: empty, over 1024 bytes, leading `/`, a `..` segment,
    /// backslashes or control characters.
    pub fn parse(key: impl Into<String>) -> StorageResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StorageError::InvalidObjectKey("key is empty".into()));
        }
        if key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey(format!(
                "key exceeds {} bytes",
                MAX_OBJECT_KEY_LEN
            )));
        }
        if key.starts_with('/') {
            return Err(StorageError::InvalidObjectKey(
                "key must not start with `/`".into(),
            ));
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidObjectKey(
                "key must not contain `..` segments".into(),
            ));
        }
        if key.chars().any(|c| c.is_control() || c == '\\') {
            return Err(StorageError::InvalidObjectKey(
                "key contains control characters or backslashes".into(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One object as reported by a store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Entry of the `/list-files` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: i64,
    /// `YYYY-MM-DD HH:MM:SS` in the store's timezone; empty when unknown.
    pub last_modified: String,
}

impl From<ObjectSummary> for FileInfo {
    fn from(summary: ObjectSummary) -> Self {
        Self {
            name: summary.key,
            size: summary.size,
            last_modified: summary
                .last_modified
                .map(|ts| ts.format(LAST_MODIFIED_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}
