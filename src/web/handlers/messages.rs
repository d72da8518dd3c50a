//! Message posting handler.

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::{PostMessageRequest, PostMessageResponse};
use crate::web::error::ApiError;
use crate::web::middleware::SessionCredential;

/// POST /messages - Publish a message as the logged-in nick.
///
/// Responds as soon as the message is published; a command reply follows on
/// the event stream.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    credential: SessionCredential,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostMessageResponse>), ApiError> {
    let Json(post) = payload?;

    let receipt = state.ingress.post(credential.as_deref(), post).await?;
    tracing::debug!(event_id = receipt.sequence, "Post accepted");

    Ok((StatusCode::CREATED, Json(PostMessageResponse { success: true })))
}
