//! Serves payloads for signed read links issued by the local backend.
//!
//! - GET /files/{*key}?expires&signature -> object bytes

use crate::{
    errors::{AppError, AuthFailure},
    state::AppState,
    storage::StoreErrorKind,
};
use axum::{
    body::Body,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct SignedLinkQuery {
    pub expires: i64,
    pub signature: String,
}

/// `GET /files/{*key}`
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    link: Result<Query<SignedLinkQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(link) = link.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let files = state
        .files
        .as_ref()
        .ok_or_else(|| AppError::not_found("file serving is not enabled"))?;

    files
        .verify_read_link(&key, link.expires, &link.signature)
        .map_err(|err| {
            tracing::debug!(key = %key, "{}", err);
            AppError::Auth(AuthFailure::InvalidToken)
        })?;

    let (object, file) = files.open_object(&key).await.map_err(|err| {
        if err.kind == StoreErrorKind::NotFound {
            AppError::not_found("no such photo")
        } else {
            AppError::Store(err)
        }
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let content_type = object
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(len) = HeaderValue::from_str(&object.size_bytes.to_string()) {
        headers.insert(header::CONTENT_LENGTH, len);
    }
    if let Some(etag) = object.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
            headers.insert(header::ETAG, value);
        }
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600"),
    );

    Ok(response)
}
