use crate::{errors::AppError, models::comment::CommentEntry, state::AppState};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PostCommentRequest {
    #[serde(default, alias = "message")]
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct PostCommentResponse {
    success: bool,
    comment: CommentEntry,
}

/// `GET /api/comments`: the whole guestbook, newest first.
pub async fn list_comments(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentEntry>>, AppError> {
    Ok(Json(state.comments.list().await?))
}

/// `POST /api/comments`
pub async fn post_comment(
    State(state): State<AppState>,
    body: Result<Json<PostCommentRequest>, JsonRejection>,
) -> Result<Json<PostCommentResponse>, AppError> {
    let Json(request) =
        body.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let text = request
        .comment
        .ok_or_else(|| AppError::validation("comment is required"))?;

    let comment = state.comments.append(&text).await?;
    Ok(Json(PostCommentResponse {
        success: true,
        comment,
    }))
}
