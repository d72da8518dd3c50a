//! External command catalogs.
//!
//! An extension catalog exposes commands that live outside the process's
//! built-in table: sandboxed scripts, a remote executor, or an in-process
//! table used when embedding. The registry only sees the capability "list
//! names" and "given a name and a message, produce a reply or nothing".

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::chat::Message;

/// Failure while listing or invoking an extension command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// The catalog could not be reached or returned an error status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The command's guest code failed.
    #[error("script error: {0}")]
    Script(String),

    /// The invocation exceeded its wall-clock limit.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The catalog replied with something that is not a message.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

/// A source of extension commands for one extension point.
#[async_trait]
pub trait ExtensionCatalog: Send + Sync {
    /// Name of the extension point this catalog serves.
    fn extension_point(&self) -> &str;

    /// List the command names currently available.
    async fn list(&self) -> Result<Vec<String>, ExtensionError>;

    /// Run a command.
    ///
    /// Returns `Ok(None)` when the catalog has no such command.
    async fn invoke(&self, name: &str, message: Message)
        -> Result<Option<Message>, ExtensionError>;
}

/// Handler type for table-backed extensions.
pub type ExtensionFn =
    Arc<dyn Fn(Message) -> Result<Option<Message>, ExtensionError> + Send + Sync>;

/// In-process extension catalog backed by a table of closures.
#[derive(Clone)]
pub struct TableCatalog {
    extension_point: String,
    commands: BTreeMap<String, ExtensionFn>,
}

impl TableCatalog {
    /// Create an empty catalog for an extension point.
    pub fn new(extension_point: impl Into<String>) -> Self {
        Self {
            extension_point: extension_point.into(),
            commands: BTreeMap::new(),
        }
    }

    /// Add a command.
    pub fn with_command<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Message) -> Result<Option<Message>, ExtensionError> + Send + Sync + 'static,
    {
        self.commands.insert(name.into(), Arc::new(handler));
        self
    }

    /// Get the number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the catalog has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for TableCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableCatalog")
            .field("extension_point", &self.extension_point)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ExtensionCatalog for TableCatalog {
    fn extension_point(&self) -> &str {
        &self.extension_point
    }

    async fn list(&self) -> Result<Vec<String>, ExtensionError> {
        Ok(self.commands.keys().cloned().collect())
    }

    async fn invoke(
        &self,
        name: &str,
        message: Message,
    ) -> Result<Option<Message>, ExtensionError> {
        match self.commands.get(name) {
            Some(handler) => handler(message),
            None => Ok(None),
        }
    }
}
