//! Command dispatcher.
//!
//! Turns a trigger-prefixed message into exactly one bot reply.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use super::extension::{ExtensionCatalog, ExtensionError};
use super::registry::{CommandRegistry, Resolved};
use crate::chat::{ContentType, Message, BOT_NICK};

/// Default command trigger.
pub const DEFAULT_TRIGGER: char = '/';

/// Default wall-clock limit for an extension invocation.
pub const DEFAULT_EXTENSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of parsing a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput<'a> {
    /// The body does not start with the trigger.
    NotCommand,
    /// The trigger with no command name.
    Bare,
    /// A command name and its (trimmed) arguments.
    Command { name: &'a str, args: &'a str },
}

/// Parse a body for a leading trigger.
pub fn parse_input(body: &str, trigger: char) -> CommandInput<'_> {
    let Some(rest) = body.strip_prefix(trigger) else {
        return CommandInput::NotCommand;
    };

    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let name = &rest[..name_end];
    if name.is_empty() {
        return CommandInput::Bare;
    }

    CommandInput::Command {
        name,
        args: rest[name_end..].trim(),
    }
}

/// Reply for a trigger with no command name.
pub fn missing_command_reply() -> Message {
    Message::bot("Error: missing command name")
}

/// Reply for a command nobody knows.
pub fn unknown_command_reply(name: &str) -> Message {
    Message::bot(format!("Error: unknown command {name}"))
}

/// Reply for an extension that failed to run.
pub fn failed_command_reply(name: &str) -> Message {
    Message::bot(format!("Error: command {name} failed"))
}

/// Dispatches command messages through a registry.
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    trigger: char,
    timeout: Duration,
}

impl CommandDispatcher {
    /// Create a dispatcher with the default trigger and timeout.
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            trigger: DEFAULT_TRIGGER,
            timeout: DEFAULT_EXTENSION_TIMEOUT,
        }
    }

    /// Set the trigger character.
    pub fn with_trigger(mut self, trigger: char) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the extension invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the trigger character.
    pub fn trigger(&self) -> char {
        self.trigger
    }

    /// Get the registry.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Check if a body is command-shaped.
    pub fn is_command(&self, body: &str) -> bool {
        body.starts_with(self.trigger)
    }

    /// Produce the bot reply for a message.
    ///
    /// Returns `None` if the body does not start with the trigger. Every
    /// trigger-prefixed body yields exactly one reply, sent as `bot`.
    pub async fn dispatch(&self, message: &Message) -> Option<Message> {
        let (name, args) = match parse_input(&message.body, self.trigger) {
            CommandInput::NotCommand => return None,
            CommandInput::Bare => return Some(missing_command_reply()),
            CommandInput::Command { name, args } => (name, args),
        };

        let request = Message {
            nick: message.nick.clone(),
            body: args.to_string(),
            content_type: message.content_type,
        };

        let reply = match self.registry.resolve(name).await {
            Ok(Some(Resolved::Builtin(command))) => {
                debug!(command = %name, nick = %message.nick, "Running built-in command");
                match panic::catch_unwind(AssertUnwindSafe(move || command.run(request))) {
                    Ok(reply) => reply,
                    Err(payload) => {
                        warn!(
                            command = %name,
                            panic = %panic_message(payload.as_ref()),
                            "Built-in command panicked"
                        );
                        failed_command_reply(name)
                    }
                }
            }
            Ok(Some(Resolved::Extension { catalog, name: resolved })) => {
                debug!(command = %name, nick = %message.nick, "Invoking extension command");
                match self.invoke_extension(catalog.as_ref(), &resolved, request).await {
                    Ok(Some(reply)) => reply,
                    Ok(None) => unknown_command_reply(name),
                    Err(e) => {
                        warn!(command = %name, error = %e, "Extension command failed");
                        failed_command_reply(name)
                    }
                }
            }
            Ok(None) => unknown_command_reply(name),
            Err(e) => {
                warn!(command = %name, error = %e, "Failed to resolve command");
                failed_command_reply(name)
            }
        };

        Some(Message {
            nick: BOT_NICK.to_string(),
            ..reply
        })
    }

    /// Run an extension under the timeout, mapping a panic to a script error.
    async fn invoke_extension(
        &self,
        catalog: &dyn ExtensionCatalog,
        name: &str,
        request: Message,
    ) -> Result<Option<Message>, ExtensionError> {
        let invocation = AssertUnwindSafe(catalog.invoke(name, request)).catch_unwind();
        match tokio::time::timeout(self.timeout, invocation).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(ExtensionError::Script(format!(
                "handler panicked: {}",
                panic_message(payload.as_ref())
            ))),
            Err(_) => Err(ExtensionError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("trigger", &self.trigger)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Check a reply against the fallback shape.
pub fn is_error_reply(message: &Message) -> bool {
    message.nick == BOT_NICK
        && message.content_type == ContentType::Text
        && message.body.starts_with("Error: ")
}
