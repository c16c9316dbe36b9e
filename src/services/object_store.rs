//! The object-store capability used by the storage gateway.
//!
//! A connector turns a credential pair into a session; a session performs
//! single-object operations and paged listings against one store. Transport
//! and retry behaviour belong to the backend.

use crate::models::{
    bucket::BucketName, credentials::ObjectStoreCredentials, object::ObjectKey,
    object::ObjectSummary,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{io, time::Duration};
use thiserror::Error;
use tokio::time::Instant;

const WAIT_INITIAL_DELAY: Duration = Duration::from_millis(50);
const WAIT_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object store error: {0}")]
    Upstream(String),
    #[error("deletion of `{key}` from `{bucket}` not confirmed: {reason}")]
    DeletionNotConfirmed {
        bucket: String,
        key: String,
        reason: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Streaming object body.
pub type ObjectBody = BoxStream<'static, io::Result<Bytes>>;

/// Result of a GET: store-recorded metadata plus the streaming body.
pub struct ObjectDownload {
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub body: ObjectBody,
}

/// One page of a bucket listing.
#[derive(Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    /// Present while more pages remain.
    pub next_continuation_token: Option<String>,
}

/// A session against the object store, scoped to one credential pair.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` as the whole object, readable by anyone (`public-read`).
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<()>;

    async fn get_object(&self, bucket: &BucketName, key: &ObjectKey)
    -> StorageResult<ObjectDownload>;

    async fn object_exists(&self, bucket: &BucketName, key: &ObjectKey) -> StorageResult<bool>;

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> StorageResult<()>;

    async fn list_objects_page(
        &self,
        bucket: &BucketName,
        continuation_token: Option<String>,
    ) -> StorageResult<ObjectPage>;

    /// Poll until the object is gone, backing off exponentially, for at most
    /// `max_wait`.
    async fn wait_until_absent(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        max_wait: Duration,
    ) -> StorageResult<()> {
        let deadline = Instant::now() + max_wait;
        let mut delay = WAIT_INITIAL_DELAY;
        loop {
            if !self.object_exists(bucket, key).await? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StorageError::DeletionNotConfirmed {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: format!("object still present after {:?}", max_wait),
                });
            }
            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(WAIT_MAX_DELAY);
        }
    }
}

/// Opens object-store sessions for a credential pair.
pub trait ObjectStoreConnector: Send + Sync {
    fn connect(&self, credentials: &ObjectStoreCredentials) -> StorageResult<Box<dyn ObjectStore>>;
}
