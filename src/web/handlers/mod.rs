//! API handlers for the Yak HTTP surface.

pub mod auth;
pub mod commands;
pub mod events;
pub mod messages;

pub use auth::login;
pub use commands::list_commands;
pub use events::events;
pub use messages::post_message;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionStore;
use crate::chat::{Broadcaster, MessageIngress};
use crate::command::{CommandDispatcher, CommandRegistry};
use crate::config::{Config, RelayConfig};
use crate::Result;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Active sessions.
    pub sessions: Arc<SessionStore>,
    /// Event broadcaster.
    pub broadcaster: Broadcaster,
    /// Command registry.
    pub registry: Arc<CommandRegistry>,
    /// Message ingress.
    pub ingress: MessageIngress,
}

impl AppState {
    /// Wire the relay around a command registry.
    pub fn new(registry: CommandRegistry, relay: &RelayConfig, extension_timeout: Duration) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let broadcaster = Broadcaster::with_limits(relay.history_limit, relay.subscriber_buffer);
        let registry = Arc::new(registry);
        let dispatcher = CommandDispatcher::new(Arc::clone(&registry))
            .with_trigger(relay.trigger_char())
            .with_timeout(extension_timeout);
        let ingress = MessageIngress::new(Arc::clone(&sessions), broadcaster.clone(), dispatcher);

        Self {
            sessions,
            broadcaster,
            registry,
            ingress,
        }
    }

    /// Build the state from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = CommandRegistry::from_config(&config.extensions)?;
        Ok(Self::new(
            registry,
            &config.relay,
            Duration::from_secs(config.extensions.timeout_secs),
        ))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            CommandRegistry::with_defaults(),
            &RelayConfig::default(),
            crate::command::DEFAULT_EXTENSION_TIMEOUT,
        )
    }
}
