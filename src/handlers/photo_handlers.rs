//! Gallery endpoints: paginated listing, random sample, batch upload.

use crate::{
    errors::AppError,
    models::photo::{IncomingFile, SignedPhoto, UploadFailure},
    services::photo_service::{MAX_FILE_BYTES, MAX_FILES_PER_BATCH},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::{Field, MultipartRejection},
        rejection::QueryRejection,
    },
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// Multipart field carrying the image files.
pub const UPLOAD_FIELD: &str = "photos";

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 100;
const DEFAULT_COUNT: usize = 10;

/// Raw query values; parsed by hand so bad input maps to a 400 with a
/// readable message.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RandomQuery {
    pub count: Option<String>,
}

#[derive(Serialize)]
pub struct PhotoView {
    url: String,
    key: String,
    name: String,
}

impl From<SignedPhoto> for PhotoView {
    fn from(signed: SignedPhoto) -> Self {
        Self {
            url: signed.url,
            key: signed.photo.key,
            name: signed.photo.display_name,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPhotoView {
    url: String,
    key: String,
    name: String,
    /// RFC 3339, or null when the store reported no timestamp.
    last_modified: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    photos: Vec<ListedPhotoView>,
    total: usize,
    page: usize,
    limit: usize,
    total_pages: usize,
}

#[derive(Serialize)]
pub struct UploadResponse {
    success: bool,
    message: String,
    photos: Vec<PhotoView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<UploadFailure>>,
}

fn parse_positive(value: Option<&str>, name: &str, default: usize) -> Result<usize, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AppError::validation(format!(
            "{name} must be a positive integer"
        ))),
    }
}

/// `GET /api/photos/list?page&limit`
pub async fn list_photos(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ListResponse>, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let page = parse_positive(query.page.as_deref(), "page", DEFAULT_PAGE)?;
    let limit = parse_positive(query.limit.as_deref(), "limit", DEFAULT_LIMIT)?;

    let result = state.photos.list_page(page, limit).await?;
    let photos = result
        .items
        .into_iter()
        .map(|signed| ListedPhotoView {
            last_modified: signed.photo.last_modified.map(|t| t.to_rfc3339()),
            url: signed.url,
            key: signed.photo.key,
            name: signed.photo.display_name,
        })
        .collect();

    Ok(Json(ListResponse {
        photos,
        total: result.total,
        page: result.page,
        limit: result.limit,
        total_pages: result.total_pages,
    }))
}

/// `GET /api/photos/random?count`
pub async fn random_photos(
    State(state): State<AppState>,
    query: Result<Query<RandomQuery>, QueryRejection>,
) -> Result<Json<Vec<PhotoView>>, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let count = parse_positive(query.count.as_deref(), "count", DEFAULT_COUNT)?;

    let sample = state.photos.random_sample(count).await?;
    Ok(Json(sample.into_iter().map(PhotoView::from).collect()))
}

/// Buffer at most `MAX_FILE_BYTES + 1` bytes of a field, draining the rest,
/// so oversized files are detected without holding them in memory.
async fn read_capped(field: &mut Field<'_>) -> Result<bytes::Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| AppError::validation(err.body_text()))?
    {
        let room = (MAX_FILE_BYTES + 1).saturating_sub(buf.len());
        if room > 0 {
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
    }
    Ok(buf.freeze())
}

/// `POST /api/photos/upload` (multipart, field `photos`)
pub async fn upload_photos(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart =
        multipart.map_err(|rejection| AppError::validation(rejection.body_text()))?;

    let mut files = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(err.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if files.len() == MAX_FILES_PER_BATCH {
            return Err(AppError::validation(format!(
                "at most {MAX_FILES_PER_BATCH} files can be uploaded at once"
            )));
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = read_capped(&mut field).await?;
        files.push(IncomingFile {
            file_name,
            content_type,
            data,
        });
    }

    let outcome = state.photos.upload_batch(files).await?;
    let failures = outcome.all_failures();
    let message = format!("{} photos uploaded", outcome.succeeded.len());

    Ok(Json(UploadResponse {
        success: true,
        message,
        photos: outcome.succeeded.into_iter().map(PhotoView::from).collect(),
        errors: (!failures.is_empty()).then_some(failures),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_numbers_default_and_validate() {
        assert_eq!(parse_positive(None, "page", 1).unwrap(), 1);
        assert_eq!(parse_positive(Some(""), "page", 1).unwrap(), 1);
        assert_eq!(parse_positive(Some(" 7 "), "limit", 100).unwrap(), 7);
        for bad in ["0", "-1", "abc", "1.5"] {
            assert!(
                matches!(
                    parse_positive(Some(bad), "count", 10),
                    Err(AppError::Validation(_))
                ),
                "{bad}"
            );
        }
    }
}
