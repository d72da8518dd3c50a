//! Request DTOs for the Yak HTTP API.

use serde::Deserialize;

pub use crate::chat::IncomingPost as PostMessageRequest;

/// Login request.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    /// Requested nick.
    #[serde(default)]
    pub nick: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_nick_optional() {
        let req: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(req.nick.is_none());

        let req: LoginRequest = serde_json::from_str(r#"{"nick":"alice"}"#).unwrap();
        assert_eq!(req.nick.as_deref(), Some("alice"));
    }

    #[test]
    fn test_post_request_fields_optional() {
        let req: PostMessageRequest = serde_json::from_str(r#"{"body":"hi"}"#).unwrap();
        assert!(req.nick.is_none());
        assert_eq!(req.body.as_deref(), Some("hi"));
    }
}
