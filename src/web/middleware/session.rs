//! Session credential extraction.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// The session token presented with a request, if any.
///
/// Read from `Authorization: Bearer <token>`, falling back to a `token`
/// query parameter. Never rejects: a missing credential is reported by the
/// handler as `NotLoggedIn`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredential(pub Option<String>);

impl SessionCredential {
    /// Get the token as a string slice.
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "token" {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionCredential(
            bearer_token(parts).or_else(|| query_token(parts)),
        ))
    }
}
