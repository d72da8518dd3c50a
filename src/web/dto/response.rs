//! Response DTOs for the Yak HTTP API.

use serde::Serialize;

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Always true.
    pub success: bool,
    /// Session token to send as `Authorization: Bearer <token>`.
    pub token: String,
    /// Nick bound to the session.
    pub nick: String,
}

/// Acknowledgment for an accepted post.
#[derive(Debug, Serialize)]
pub struct PostMessageResponse {
    /// Always true.
    pub success: bool,
}

/// Command names for client-side autocomplete.
#[derive(Debug, Serialize)]
pub struct CommandListResponse {
    /// Sorted command names.
    pub slash_commands: Vec<String>,
}
