//! Per-user object operations against the login's default bucket.
//!
//! Every operation fetches fresh credentials from the broker, opens a new
//! object-store session scoped to them, and performs exactly one logical
//! operation on `<login>-default-bucket`.

use crate::{
    models::{bucket::BucketName, object::FileInfo, object::ObjectKey},
    services::{
        control_plane::ControlPlaneError,
        credential_broker::CredentialBroker,
        object_store::{
            ObjectDownload, ObjectStore, ObjectStoreConnector, StorageError, StorageResult,
        },
    },
};
use bytes::Bytes;
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Lazily paged bucket listing.
pub type FileListing = BoxStream<'static, StorageResult<FileInfo>>;

#[derive(Clone)]
pub struct StorageGateway {
    broker: CredentialBroker,
    connector: Arc<dyn ObjectStoreConnector>,
    /// Bound on waiting for a deleted object to disappear.
    delete_wait: Duration,
}

impl StorageGateway {
    pub fn new(
        broker: CredentialBroker,
        connector: Arc<dyn ObjectStoreConnector>,
        delete_wait: Duration,
    ) -> Self {
        Self {
            broker,
            connector,
            delete_wait,
        }
    }

    /// Open a session with the login's current credentials.
    async fn session(&self, login: &str) -> GatewayResult<Box<dyn ObjectStore>> {
        let credentials = self.broker.get_keys(login).await?;
        Ok(self.connector.connect(&credentials)?)
    }

    /// Store `body` as `key` in the login's bucket, publicly readable.
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn upload(
        &self,
        login: &str,
        key: &ObjectKey,
        content_type: Option<&str>,
        body: Bytes,
    ) -> GatewayResult<()> {
        let bucket = BucketName::for_login(login)?;
        let store = self.session(login).await?;
        store.put_object(&bucket, key, content_type, body).await?;
        info!(bucket = %bucket, key = %key, "file uploaded");
        Ok(())
    }

    /// Open the object for streaming. `NotFound` when the key is absent.
    #[instrument(skip(self))]
    pub async fn download(&self, login: &str, key: &ObjectKey) -> GatewayResult<ObjectDownload> {
        let bucket = BucketName::for_login(login)?;
        let store = self.session(login).await?;
        Ok(store.get_object(&bucket, key).await?)
    }

    /// Delete `key` and return only once the store confirms it is gone.
    ///
    /// A missing key fails fast with `NotFound` rather than waiting. If the
    /// delete succeeds but confirmation does not arrive in time the caller
    /// gets an error and cannot tell whether the object is gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, login: &str, key: &ObjectKey) -> GatewayResult<BucketName> {
        let bucket = BucketName::for_login(login)?;
        let store = self.session(login).await?;

        if !store.object_exists(&bucket, key).await? {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
            .into());
        }

        store.delete_object(&bucket, key).await?;
        store
            .wait_until_absent(&bucket, key, self.delete_wait)
            .await?;
        info!(bucket = %bucket, key = %key, "file deleted");
        Ok(bucket)
    }

    /// List every object in the login's bucket in store-defined order
    /// (lexicographic by key for S3), fetching pages as the stream is polled.
    #[instrument(skip(self))]
    pub async fn list(&self, login: &str) -> GatewayResult<FileListing> {
        let bucket = BucketName::for_login(login)?;
        let store = self.session(login).await?;
        Ok(paged_listing(store, bucket))
    }
}

enum Cursor {
    Start,
    After(String),
    Done,
}

fn paged_listing(store: Box<dyn ObjectStore>, bucket: BucketName) -> FileListing {
    stream::try_unfold(
        (store, bucket, Cursor::Start),
        |(store, bucket, cursor)| async move {
            let token = match cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => None,
                Cursor::After(token) => Some(token),
            };

            let page = store.list_objects_page(&bucket, token.clone()).await?;
            let next = match page.next_continuation_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    return Err(StorageError::Upstream(format!(
                        "listing of `{}` did not advance past `{}`",
                        bucket, next
                    )));
                }
                Some(next) => Cursor::After(next),
                None => Cursor::Done,
            };

            let entries = stream::iter(
                page.objects
                    .into_iter()
                    .map(|o| Ok::<_, StorageError>(FileInfo::from(o))),
            );
            Ok::<_, StorageError>(Some((entries, (store, bucket, next))))
        },
    )
    .try_flatten()
    .boxed()
}
