use crate::{
    models::photo::UploadFailure,
    storage::{LogError, StoreError},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Why a request failed the session gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredential,
    WrongPassword,
    InvalidToken,
    ExpiredToken,
}

impl AuthFailure {
    fn message(self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "authentication token required",
            AuthFailure::WrongPassword => "incorrect password",
            AuthFailure::InvalidToken => "invalid token",
            AuthFailure::ExpiredToken => "token expired",
        }
    }
}

/// Every failure the gateway can report. Each variant maps to one HTTP
/// status class and a `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{}", .0.message())]
    Auth(AuthFailure),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] LogError),
    #[error("{0}")]
    Configuration(String),
    #[error("all {} files failed to upload", .failures.len())]
    UploadFailed { failures: Vec<UploadFailure> },
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthFailure::MissingCredential | AuthFailure::WrongPassword) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Auth(AuthFailure::InvalidToken | AuthFailure::ExpiredToken) => {
                StatusCode::FORBIDDEN
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_)
            | AppError::Backend(_)
            | AppError::Configuration(_)
            | AppError::UploadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Backend details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Store(_) => "photo storage request failed".into(),
            AppError::Backend(_) => "guestbook storage request failed".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Store(err) => {
                tracing::error!(op = err.op, key = ?err.key, kind = ?err.kind, "{}", err)
            }
            AppError::Backend(err) => tracing::error!("{}", err),
            AppError::Configuration(msg) => tracing::error!("configuration error: {}", msg),
            AppError::UploadFailed { failures } => {
                tracing::warn!(count = failures.len(), "upload batch failed entirely")
            }
            _ => tracing::debug!(status = %self.status(), "{}", self),
        }

        let status = self.status();
        let body = match &self {
            AppError::UploadFailed { failures } => json!({
                "error": self.public_message(),
                "errors": failures,
            }),
            other => json!({ "error": other.public_message() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreErrorKind;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn statuses_follow_error_class() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                AppError::Auth(AuthFailure::MissingCredential),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Auth(AuthFailure::WrongPassword),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Auth(AuthFailure::ExpiredToken),
                StatusCode::FORBIDDEN,
            ),
            (AppError::not_found("none"), StatusCode::NOT_FOUND),
            (
                AppError::Configuration("no bucket".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err:?}");
        }
    }

    #[tokio::test]
    async fn store_details_are_not_exposed() {
        let err = AppError::from(
            StoreError::new("list", StoreErrorKind::Auth, "InvalidAccessKeyId: AKIA123")
                .with_key("uploads/x.jpg"),
        );
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "photo storage request failed");
        assert!(!body.to_string().contains("AKIA123"));
    }

    #[tokio::test]
    async fn upload_failure_lists_each_file() {
        let err = AppError::UploadFailed {
            failures: vec![UploadFailure {
                file_name: "a.jpg".into(),
                error: "connection reset".into(),
            }],
        };
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "all 1 files failed to upload");
        assert_eq!(body["errors"][0]["fileName"], "a.jpg");
        assert_eq!(body["errors"][0]["error"], "connection reset");
    }
}
