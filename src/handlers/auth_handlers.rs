use crate::{errors::AppError, services::session::SESSION_TTL_LABEL, state::AppState};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    success: bool,
    token: String,
    expires_in: &'static str,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    success: bool,
    authenticated: bool,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) =
        body.map_err(|rejection| AppError::validation(rejection.body_text()))?;

    let token = state.sessions.login(&request.password)?;
    info!("session issued");

    Ok(Json(LoginResponse {
        success: true,
        token,
        expires_in: SESSION_TTL_LABEL,
    }))
}

/// `GET /api/auth/verify`
///
/// Mounted behind the session gate, so reaching it means the token is good.
pub async fn verify() -> Json<VerifyResponse> {
    Json(VerifyResponse {
        success: true,
        authenticated: true,
    })
}
