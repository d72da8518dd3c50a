//! Nick sessions for Yak.
//!
//! A session binds a nick to an opaque 128-bit token for the lifetime of the
//! process. There is at most one session per nick.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Session-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Nick is missing or blank.
    #[error("nick is required")]
    NoNick,

    /// The nick already has a session.
    #[error("nick {0:?} is already logged in")]
    DuplicateIdentity(String),

    /// Token is malformed or unknown.
    #[error("session not found")]
    NoSession,
}

/// Number of hex digits in a rendered token.
pub const TOKEN_HEX_LEN: usize = 32;

/// Opaque session token.
///
/// Rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u128);

impl SessionToken {
    /// Generate a random token.
    pub fn generate() -> Self {
        Self(rand::random::<u128>())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for SessionToken {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != TOKEN_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SessionError::NoSession);
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| SessionError::NoSession)
    }
}

/// A logged-in nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session token.
    pub token: SessionToken,
    /// Nick bound to this session.
    pub nick: String,
}

#[derive(Debug, Default)]
struct Sessions {
    by_token: HashMap<SessionToken, String>,
    by_nick: HashMap<String, SessionToken>,
}

/// Store of active sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<Sessions>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log in a nick and create its session.
    ///
    /// Surrounding whitespace is trimmed from the nick before it is stored.
    pub async fn login(&self, nick: &str) -> Result<Session, SessionError> {
        let nick = nick.trim();
        if nick.is_empty() {
            return Err(SessionError::NoNick);
        }

        let mut sessions = self.sessions.write().await;

        if sessions.by_nick.contains_key(nick) {
            warn!(nick = %nick, "Login rejected: nick already has a session");
            return Err(SessionError::DuplicateIdentity(nick.to_string()));
        }

        let mut token = SessionToken::generate();
        while sessions.by_token.contains_key(&token) {
            debug!("Session token collision, regenerating");
            token = SessionToken::generate();
        }

        sessions.by_token.insert(token, nick.to_string());
        sessions.by_nick.insert(nick.to_string(), token);

        info!(nick = %nick, "Session created");

        Ok(Session {
            token,
            nick: nick.to_string(),
        })
    }

    /// Resolve a rendered token to its nick.
    pub async fn authenticate(&self, token: &str) -> Result<String, SessionError> {
        let token: SessionToken = token.trim().parse()?;
        self.sessions
            .read()
            .await
            .by_token
            .get(&token)
            .cloned()
            .ok_or(SessionError::NoSession)
    }

    /// Check whether a nick has a session.
    pub async fn is_logged_in(&self, nick: &str) -> bool {
        self.sessions.read().await.by_nick.contains_key(nick.trim())
    }

    /// Get the number of active sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.by_token.len()
    }
}
