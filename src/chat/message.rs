//! Chat messages and broadcast events.

use serde::{Deserialize, Serialize};

/// Reserved sender name for command replies.
pub const BOT_NICK: &str = "bot";

/// How a message body should be rendered by clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Plain text.
    #[default]
    Text,
    /// HTML markup.
    Html,
    /// Image URL.
    Image,
}

impl ContentType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Html => "html",
            ContentType::Image => "image",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender's nick.
    #[serde(default)]
    pub nick: String,
    /// Message body.
    pub body: String,
    /// Rendering hint.
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
}

impl Message {
    /// Create a new text message.
    pub fn new(nick: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            body: body.into(),
            content_type: ContentType::Text,
        }
    }

    /// Create a text message sent by the bot.
    pub fn bot(body: impl Into<String>) -> Self {
        Self::new(BOT_NICK, body)
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Check if this message was sent by the bot.
    pub fn is_from_bot(&self) -> bool {
        self.nick == BOT_NICK
    }
}

/// Payload of a heartbeat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub alive: bool,
}

/// The unit of broadcast.
///
/// Serialized as `{"type": "message", "payload": {...}}` or
/// `{"type": "heartbeat", "payload": {"alive": true}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Event {
    /// A chat message.
    Message(Message),
    /// Periodic liveness signal.
    Heartbeat(Liveness),
}

impl Event {
    /// Create a heartbeat event.
    pub fn heartbeat() -> Self {
        Event::Heartbeat(Liveness { alive: true })
    }

    /// Event kind name as used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::Heartbeat(_) => "heartbeat",
        }
    }

    /// Get the message if this is a message event.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Event::Message(message) => Some(message),
            Event::Heartbeat(_) => None,
        }
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::Message(message)
    }
}

/// A published event together with its sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Monotonically increasing sequence id assigned at publish time.
    pub id: u64,
    /// The event.
    pub event: Event,
}

impl Frame {
    /// Serialize the event payload as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.event)
    }
}
