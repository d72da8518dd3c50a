//! Login handler.

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::{LoginRequest, LoginResponse};
use crate::web::error::ApiError;

/// POST /login - Claim a nick and receive a session token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let Json(req) = payload?;

    let session = state
        .sessions
        .login(req.nick.as_deref().unwrap_or_default())
        .await?;

    tracing::info!(nick = %session.nick, "User logged in");

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            success: true,
            token: session.token.to_string(),
            nick: session.nick,
        }),
    ))
}
