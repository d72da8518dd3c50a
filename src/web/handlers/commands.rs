//! Command listing handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::CommandListResponse;

/// GET /slash-commands - List command names for autocomplete.
pub async fn list_commands(State(state): State<Arc<AppState>>) -> Json<CommandListResponse> {
    Json(CommandListResponse {
        slash_commands: state.registry.list_names().await,
    })
}
