//! Session gate applied to every protected route.

use crate::{
    errors::{AppError, AuthFailure},
    state::AppState,
};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

/// Reject requests without a valid `Authorization: Bearer <token>` header.
///
/// Missing credentials answer 401; malformed, forged or expired tokens 403.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Auth(AuthFailure::MissingCredential))?;

    state.sessions.validate(token)?;
    Ok(next.run(request).await)
}
