//! In-process object store for development and tests.

use crate::{
    models::{
        bucket::BucketName, credentials::ObjectStoreCredentials, object::ObjectKey,
        object::ObjectSummary,
    },
    services::object_store::{
        ObjectDownload, ObjectPage, ObjectStore, ObjectStoreConnector, StorageError, StorageResult,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: DateTime<Utc>,
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

/// Buckets held in memory, shared by every session opened from it.
///
/// Keys list in lexicographic order, `page_size` entries per page. Sessions
/// are accepted for any complete credential pair.
#[derive(Clone)]
pub struct MemoryObjectStore {
    buckets: Arc<Mutex<Buckets>>,
    sessions: Arc<Mutex<Vec<String>>>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: Arc::default(),
            sessions: Arc::default(),
            page_size: page_size.max(1),
        }
    }

    /// Access keys of every session opened so far, in order.
    pub fn sessions_opened(&self) -> Vec<String> {
        lock(&self.sessions).clone()
    }

    /// Etag (hex MD5) of a stored object.
    pub fn etag(&self, bucket: &str, key: &str) -> Option<String> {
        lock(&self.buckets)
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.etag.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(bucket: &BucketName, key: &ObjectKey) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

impl ObjectStoreConnector for MemoryObjectStore {
    fn connect(&self, credentials: &ObjectStoreCredentials) -> StorageResult<Box<dyn ObjectStore>> {
        if !credentials.is_complete() {
            return Err(StorageError::Upstream("incomplete credentials".into()));
        }
        lock(&self.sessions).push(credentials.access_key.clone());
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<()> {
        let object = StoredObject {
            etag: format!("{:x}", md5::compute(&body)),
            data: body,
            content_type: content_type.map(str::to_owned),
            last_modified: Utc::now(),
        };
        lock(&self.buckets)
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> StorageResult<ObjectDownload> {
        let object = lock(&self.buckets)
            .get(bucket.as_str())
            .and_then(|objects| objects.get(key.as_str()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))?;

        Ok(ObjectDownload {
            content_type: object.content_type,
            content_length: Some(object.data.len() as i64),
            body: stream::once(async move { Ok(object.data) }).boxed(),
        })
    }

    async fn object_exists(&self, bucket: &BucketName, key: &ObjectKey) -> StorageResult<bool> {
        Ok(lock(&self.buckets)
            .get(bucket.as_str())
            .is_some_and(|objects| objects.contains_key(key.as_str())))
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> StorageResult<()> {
        // S3 semantics: deleting a missing key succeeds.
        if let Some(objects) = lock(&self.buckets).get_mut(bucket.as_str()) {
            objects.remove(key.as_str());
        }
        Ok(())
    }

    async fn list_objects_page(
        &self,
        bucket: &BucketName,
        continuation_token: Option<String>,
    ) -> StorageResult<ObjectPage> {
        let buckets = lock(&self.buckets);
        let Some(objects) = buckets.get(bucket.as_str()) else {
            return Ok(ObjectPage::default());
        };

        let lower = match &continuation_token {
            Some(token) => Bound::Excluded(token.as_str()),
            None => Bound::Unbounded,
        };
        let mut remaining = objects.range::<str, _>((lower, Bound::Unbounded));
        let page: Vec<ObjectSummary> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.data.len() as i64,
                last_modified: Some(object.last_modified),
            })
            .collect();

        let next_continuation_token = match remaining.next() {
            Some(_) => page.last().map(|summary| summary.key.clone()),
            None => None,
        };

        Ok(ObjectPage {
            objects: page,
            next_continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> BucketName {
        BucketName::for_login("alice").expect("bucket")
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::parse(name).expect("key")
    }

    #[tokio::test]
    async fn pages_follow_continuation_tokens() {
        let store = MemoryObjectStore::with_page_size(2);
        for name in ["c.txt", "a.txt", "b.txt"] {
            store
                .put_object(&bucket(), &key(name), None, Bytes::from_static(b"x"))
                .await
                .expect("put");
        }

        let first = store.list_objects_page(&bucket(), None).await.expect("page");
        let names: Vec<_> = first.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(first.next_continuation_token.as_deref(), Some("b.txt"));

        let second = store
            .list_objects_page(&bucket(), first.next_continuation_token)
            .await
            .expect("page");
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "c.txt");
        assert!(second.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn etag_is_hex_md5_of_the_body() {
        let store = MemoryObjectStore::new();
        store
            .put_object(&bucket(), &key("a.txt"), Some("text/plain"), Bytes::from_static(b"hello"))
            .await
            .expect("put");
        assert_eq!(
            store.etag("alice-default-bucket", "a.txt").as_deref(),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
    }

    #[test]
    fn incomplete_credentials_cannot_open_a_session() {
        let store = MemoryObjectStore::new();
        let creds = ObjectStoreCredentials {
            access_key: "AK".into(),
            secret_key: String::new(),
        };
        assert!(store.connect(&creds).is_err());
        assert!(store.sessions_opened().is_empty());
    }
}
