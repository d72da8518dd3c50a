//! Message ingress.
//!
//! Validates the poster's session, normalizes the body, publishes the
//! message, and hands command-shaped bodies to the dispatcher. The reply is
//! published from a spawned task so the poster is acknowledged as soon as
//! their own message is out.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::broadcaster::Broadcaster;
use super::message::Message;
use crate::auth::SessionStore;
use crate::command::CommandDispatcher;

/// Trailing artifacts removed from posted bodies.
const TRAILING_MARKUP: &[&str] = &["&nbsp;", "<br>", "<br/>", "<br />"];

/// Strip trailing whitespace, `&nbsp;` and `<br>` markup from a body.
///
/// Artifacts are removed repeatedly, in any order, until none remain.
pub fn normalize_body(body: &str) -> &str {
    let mut rest = body.trim_end();
    loop {
        let Some(stripped) = TRAILING_MARKUP
            .iter()
            .find_map(|suffix| rest.strip_suffix(*suffix))
        else {
            return rest;
        };
        rest = stripped.trim_end();
    }
}

/// A post as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingPost {
    /// Nick the client claims.
    #[serde(default)]
    pub nick: Option<String>,
    /// Message body.
    #[serde(default)]
    pub body: Option<String>,
}

impl IncomingPost {
    /// Create a post.
    pub fn new(nick: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            nick: Some(nick.into()),
            body: Some(body.into()),
        }
    }
}

/// Reasons a post is rejected before publication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngressError {
    /// Nick missing or blank.
    #[error("nick is required")]
    NoNick,

    /// No session credential supplied.
    #[error("not logged in")]
    NotLoggedIn,

    /// Credential is malformed or unknown.
    #[error("invalid session")]
    InvalidSession,

    /// Posted nick differs from the session's nick.
    #[error("nick does not match session")]
    IdentityMismatch,

    /// Body missing.
    #[error("body is required")]
    MissingBody,
}

impl IngressError {
    /// Machine-readable reason sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            IngressError::NoNick => "NoNick",
            IngressError::NotLoggedIn => "NotLoggedIn",
            IngressError::InvalidSession => "InvalidSession",
            IngressError::IdentityMismatch => "IdentityMismatch",
            IngressError::MissingBody => "MissingBody",
        }
    }
}

/// Acknowledgment for an accepted post.
#[derive(Debug)]
pub struct PostReceipt {
    /// Sequence id of the published message.
    pub sequence: u64,
    /// Pending command reply; resolves to the reply's sequence id.
    pub reply: Option<JoinHandle<u64>>,
}

impl PostReceipt {
    /// Wait for the command reply to be published.
    ///
    /// Returns `None` if the post was not a command.
    pub async fn reply_sequence(self) -> Option<u64> {
        match self.reply {
            Some(handle) => match handle.await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Command reply task failed");
                    None
                }
            },
            None => None,
        }
    }
}

/// Entry point for posted messages.
#[derive(Clone)]
pub struct MessageIngress {
    sessions: Arc<SessionStore>,
    broadcaster: Broadcaster,
    dispatcher: CommandDispatcher,
}

impl MessageIngress {
    /// Create an ingress.
    pub fn new(
        sessions: Arc<SessionStore>,
        broadcaster: Broadcaster,
        dispatcher: CommandDispatcher,
    ) -> Self {
        Self {
            sessions,
            broadcaster,
            dispatcher,
        }
    }

    /// Get the session store.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Get the broadcaster.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Accept a post.
    ///
    /// `credential` is the session token presented with the post. Rejected
    /// posts are never published.
    pub async fn post(
        &self,
        credential: Option<&str>,
        post: IncomingPost,
    ) -> Result<PostReceipt, IngressError> {
        let nick = post
            .nick
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(IngressError::NoNick)?;
        let body = post.body.as_deref().ok_or(IngressError::MissingBody)?;
        let credential = credential.ok_or(IngressError::NotLoggedIn)?;

        let session_nick = self
            .sessions
            .authenticate(credential)
            .await
            .map_err(|_| IngressError::InvalidSession)?;
        if session_nick != nick {
            info!(nick = %nick, session = %session_nick, "Post rejected: identity mismatch");
            return Err(IngressError::IdentityMismatch);
        }

        let message = Message::new(session_nick, normalize_body(body));
        let is_command = self.dispatcher.is_command(&message.body);
        let sequence = self.broadcaster.publish(message.clone());
        debug!(nick = %message.nick, event_id = sequence, "Message published");

        let reply = is_command.then(|| {
            let dispatcher = self.dispatcher.clone();
            let broadcaster = self.broadcaster.clone();
            tokio::spawn(async move {
                let reply = dispatcher
                    .dispatch(&message)
                    .await
                    .unwrap_or_else(crate::command::missing_command_reply);
                let id = broadcaster.publish(reply);
                debug!(event_id = id, "Command reply published");
                id
            })
        });

        Ok(PostReceipt { sequence, reply })
    }
}
