//! Remote extension catalog.
//!
//! Talks to an extension executor over HTTP:
//!
//! - `GET {base}/{point}/commands` returns a JSON array of command names.
//! - `POST {base}/{point}/commands/{name}` with a JSON message returns the
//!   reply message (200), or reports absence (404 or 204).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::extension::{ExtensionCatalog, ExtensionError};
use crate::chat::Message;
use crate::{Result, YakError};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// User agent string for catalog requests.
const USER_AGENT: &str = concat!("yak/", env!("CARGO_PKG_VERSION"));

/// Extension catalog served by a remote executor.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    client: Client,
    base_url: String,
    extension_point: String,
}

impl RemoteCatalog {
    /// Create a catalog for `base_url` and an extension point.
    ///
    /// `timeout` bounds every request end to end.
    pub fn new(base_url: &str, extension_point: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| YakError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            extension_point: extension_point.to_string(),
        })
    }

    fn commands_url(&self) -> String {
        format!(
            "{}/{}/commands",
            self.base_url,
            urlencoding::encode(&self.extension_point)
        )
    }

    fn command_url(&self, name: &str) -> String {
        format!("{}/{}", self.commands_url(), urlencoding::encode(name))
    }
}

fn transport(e: reqwest::Error) -> ExtensionError {
    if e.is_timeout() {
        ExtensionError::Transport(format!("request timed out: {e}"))
    } else {
        ExtensionError::Transport(e.to_string())
    }
}

#[async_trait]
impl ExtensionCatalog for RemoteCatalog {
    fn extension_point(&self) -> &str {
        &self.extension_point
    }

    async fn list(&self) -> std::result::Result<Vec<String>, ExtensionError> {
        let url = self.commands_url();
        debug!(url = %url, "Listing remote commands");

        let response = self.client.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(ExtensionError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ExtensionError::InvalidReply(format!("command list: {e}")))
    }

    async fn invoke(
        &self,
        name: &str,
        message: Message,
    ) -> std::result::Result<Option<Message>, ExtensionError> {
        let url = self.command_url(name);
        debug!(url = %url, command = %name, "Invoking remote command");

        let response = self
            .client
            .post(&url)
            .json(&message)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Ok(None),
            status if !status.is_success() => {
                return Err(ExtensionError::Transport(format!("HTTP error: {status}")));
            }
            _ => {}
        }

        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice::<Message>(&bytes)
            .map(Some)
            .map_err(|e| ExtensionError::InvalidReply(e.to_string()))
    }
}
