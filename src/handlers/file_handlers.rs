//! HTTP handlers for file operations in the caller's default bucket.
//! Downloads stream the object body; uploads are buffered up to the route's
//! body limit.

use crate::{
    errors::AppError,
    handlers::auth::authenticate,
    models::{bucket::BucketName, object::FileInfo, object::ObjectKey},
    services::object_store::StorageError,
    state::GatewayState,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{
        Multipart, Query, State, multipart::MultipartRejection, rejection::QueryRejection,
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Query of `/download-file`, `/delete-file` and `/list-files`.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileInfo>,
}

/// `file` part of an upload.
struct UploadedFile {
    key: ObjectKey,
    content_type: Option<String>,
    data: Bytes,
}

fn query(query: Result<Query<FileQuery>, QueryRejection>) -> Result<FileQuery, AppError> {
    query
        .map(|Query(q)| q)
        .map_err(|err| AppError::bad_request(err.body_text()))
}

/// Validate `username` and return it together with its default bucket.
fn require_username(username: &str) -> Result<BucketName, AppError> {
    if username.is_empty() {
        return Err(AppError::bad_request("Missing username parameter"));
    }
    Ok(BucketName::for_login(username)?)
}

fn require_filename(filename: String) -> Result<ObjectKey, AppError> {
    if filename.is_empty() {
        return Err(AppError::bad_request("Missing filename parameter"));
    }
    Ok(ObjectKey::parse(filename)?)
}

/// `POST /upload-file` (multipart fields `username` and `file`)
pub async fn upload_file(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart.map_err(|err| AppError::bad_request(err.body_text()))?;

    let mut username = None;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("username") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
                username = Some(text);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_owned)
                    .unwrap_or_default();
                let key = require_filename(filename)?;
                let content_type = field.content_type().map(str::to_owned);
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::new(err.status(), err.body_text()))?;
                upload = Some(UploadedFile {
                    key,
                    content_type,
                    data,
                });
            }
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }

    let username = username.unwrap_or_default();
    require_username(&username)?;
    let upload = upload.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    authenticate(&state, &headers, &username).await?;

    state
        .storage
        .upload(
            &username,
            &upload.key,
            upload.content_type.as_deref(),
            upload.data,
        )
        .await?;
    Ok("File uploaded successfully!\n")
}

/// `attachment` disposition carrying the key twice: as an ASCII quoted
/// string for old clients and as RFC 5987 `filename*` for the exact name.
fn content_disposition(key: &ObjectKey) -> Result<HeaderValue, AppError> {
    let mut fallback = String::with_capacity(key.as_str().len());
    for c in key.as_str().chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => fallback.push(c),
            _ => fallback.push('_'),
        }
    }

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(key.as_str())
    );
    HeaderValue::from_str(&value)
        .map_err(|_| AppError::from(StorageError::InvalidObjectKey(key.to_string())))
}

/// `GET /download-file?username=&filename=` as a streaming attachment.
pub async fn download_file(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    params: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let params = query(params)?;
    require_username(&params.username)?;
    let key = require_filename(params.filename)?;
    authenticate(&state, &headers, &params.username).await?;

    let download = state.storage.download(&params.username, &key).await?;

    let disposition = content_disposition(&key)?;
    let content_type = download
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let mut response = Response::new(Body::from_stream(download.body));
    let resp_headers = response.headers_mut();
    resp_headers.insert(header::CONTENT_DISPOSITION, disposition);
    resp_headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(len) = download.content_length.filter(|len| *len >= 0) {
        resp_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    Ok(response)
}

/// `DELETE /delete-file?username=&filename=`
///
/// Answers only after the store confirms the object is gone.
pub async fn delete_file(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    params: Result<Query<FileQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let params = query(params)?;
    require_username(&params.username)?;
    let key = require_filename(params.filename)?;
    authenticate(&state, &headers, &params.username).await?;

    let bucket = state.storage.delete(&params.username, &key).await?;
    Ok((
        StatusCode::OK,
        format!("File {} deleted from bucket {}", key, bucket),
    ))
}

/// `GET /list-files?username=`
pub async fn list_files(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    params: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Json<FileListResponse>, AppError> {
    let params = query(params)?;
    require_username(&params.username)?;
    authenticate(&state, &headers, &params.username).await?;

    let files: Vec<FileInfo> = state
        .storage
        .list(&params.username)
        .await?
        .try_collect()
        .await?;
    debug!(username = %params.username, count = files.len(), "listed files");
    Ok(Json(FileListResponse { files }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameters_are_bad_requests() {
        assert_eq!(
            require_username("").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            require_filename(String::new()).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn logins_that_cannot_name_a_bucket_are_bad_requests() {
        let err = require_username("Alice_Smith").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(require_username("alice").is_ok());
    }

    #[test]
    fn unsafe_filenames_are_bad_requests() {
        for name in ["../etc/passwd", "/abs", "a\\b"] {
            let err = require_filename(name.into()).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "{name:?}");
        }
    }

    #[test]
    fn disposition_quotes_separators_and_encodes_the_exact_name() {
        let key = require_filename(r#"q1 report; "final".csv"#.into()).expect("key");
        let value = content_disposition(&key).expect("header");
        assert_eq!(
            value.to_str().expect("ascii"),
            r#"attachment; filename="q1 report; \"final\".csv"; filename*=UTF-8''q1%20report%3B%20%22final%22.csv"#
        );
    }

    #[test]
    fn disposition_of_non_ascii_name_has_ascii_fallback() {
        let key = require_filename("отчёт.csv".into()).expect("key");
        let value = content_disposition(&key).expect("header");
        assert_eq!(
            value.to_str().expect("ascii"),
            "attachment; filename=\"_____.csv\"; filename*=UTF-8''%D0%BE%D1%82%D1%87%D1%91%D1%82.csv"
        );
    }
}
