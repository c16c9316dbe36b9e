//! S3-compatible backend built on `aws-sdk-s3`.
//!
//! Each `connect` builds a fresh client with static credentials, a fixed
//! endpoint and region, and path-style addressing.

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
use aws_sdk_s3::{
    Client,
    client::Waiters,
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    primitives::{ByteStream, DateTime as S3DateTime},
    types::ObjectCannedAcl,
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::{error::Error as StdError, time::Duration};
use tokio_util::io::ReaderStream;
use tracing::debug;

const CREDENTIALS_PROVIDER: &str = "control-plane";

#[derive(Debug, Clone)]
pub struct S3Connector {
    endpoint: String,
    region: String,
}

impl S3Connector {
    pub fn new(endpoint: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: region.into(),
        }
    }
}

impl ObjectStoreConnector for S3Connector {
    fn connect(&self, credentials: &ObjectStoreCredentials) -> StorageResult<Box<dyn ObjectStore>> {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .endpoint_url(&self.endpoint)
            .credentials_provider(Credentials::new(
                credentials.access_key.clone(),
                credentials.secret_key.clone(),
                None,
                None,
                CREDENTIALS_PROVIDER,
            ))
            .force_path_style(true)
            .build();

        Ok(Box::new(S3ObjectStore {
            client: Client::from_conf(config),
        }))
    }
}

pub struct S3ObjectStore {
    client: Client,
}

fn upstream<E: StdError + 'static>(operation: &str, err: E) -> StorageError {
    StorageError::Upstream(format!("{}: {}", operation, DisplayErrorContext(&err)))
}

/// Some S3-compatible stores answer 404 without a parseable error code.
fn is_http_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|response| response.status().as_u16() == 404)
}

fn to_chrono(ts: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<()> {
        // Content-MD5 lets the store reject a body corrupted in transit.
        let digest = md5::compute(&body);
        let length = body.len() as i64;

        self.client
            .put_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .acl(ObjectCannedAcl::PublicRead)
            .set_content_type(content_type.map(str::to_owned))
            .content_md5(general_purpose::STANDARD.encode(digest.0))
            .content_length(length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| upstream("put object", err))?;

        debug!(bucket = %bucket, key = %key, bytes = length, "object written");
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> StorageResult<ObjectDownload> {
        let output = match self
            .client
            .get_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
        {
            Ok(output) => output,
            Err(err)
                if err.as_service_error().is_some_and(|e| e.is_no_such_key())
                    || is_http_not_found(&err) =>
            {
                return Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(upstream("get object", err)),
        };

        let content_type = output.content_type().map(str::to_owned);
        let content_length = output.content_length();
        let body = ReaderStream::new(output.body.into_async_read()).boxed();

        Ok(ObjectDownload {
            content_type,
            content_length,
            body,
        })
    }

    async fn object_exists(&self, bucket: &BucketName, key: &ObjectKey) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err.as_service_error().is_some_and(|e| e.is_not_found())
                    || is_http_not_found(&err) =>
            {
                Ok(false)
            }
            Err(err) => Err(upstream("head object", err)),
        }
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(|err| upstream("delete object", err))?;
        Ok(())
    }

    async fn list_objects_page(
        &self,
        bucket: &BucketName,
        continuation_token: Option<String>,
    ) -> StorageResult<ObjectPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket.as_str())
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|err| upstream("list objects", err))?;

        let objects = output
            .contents()
            .iter()
            .map(|object| ObjectSummary {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or_default(),
                last_modified: object.last_modified().and_then(to_chrono),
            })
            .collect();

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_owned)
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation_token,
        })
    }

    /// Uses the SDK's `ObjectNotExists` waiter instead of the generic poll.
    async fn wait_until_absent(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        max_wait: Duration,
    ) -> StorageResult<()> {
        self.client
            .wait_until_object_not_exists()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .wait(max_wait)
            .await
            .map(|_| ())
            .map_err(|err| StorageError::DeletionNotConfirmed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: DisplayErrorContext(&err).to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_timestamps_convert_to_utc() {
        let ts = S3DateTime::from_secs(1_709_967_901);
        let converted = to_chrono(&ts).expect("in range");
        assert_eq!(
            converted.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-03-09 07:05:01"
        );
    }

    #[tokio::test]
    async fn connect_builds_a_session_without_network_io() {
        let connector = S3Connector::new("https://storage.example.test", "us-west-2");
        let creds = ObjectStoreCredentials {
            access_key: "AK".into(),
            secret_key: "SK".into(),
        };
        assert!(connector.connect(&creds).is_ok());
    }
}
