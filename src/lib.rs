//! Yak - a minimal real-time chat relay.
//!
//! Clients log in with a nick, post messages over HTTP, and receive every
//! message plus periodic heartbeats as a server-sent event stream. Messages
//! starting with the trigger character are answered by slash commands from a
//! built-in table or an extension catalog (sandboxed Lua scripts or a remote
//! executor).

pub mod auth;
pub mod chat;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod script;
pub mod web;

pub use auth::{Session, SessionError, SessionStore, SessionToken};
pub use chat::{
    Broadcaster, ContentType, Event, Frame, Heartbeat, IncomingPost, IngressError,
    MessageIngress, Message, PostReceipt, Subscription, BOT_NICK,
};
pub use command::{
    BuiltinCommand, CommandDispatcher, CommandRegistry, ExtensionCatalog, ExtensionError,
    RemoteCatalog, TableCatalog,
};
pub use config::Config;
pub use error::{Result, YakError};
pub use script::LuaCatalog;
pub use web::{AppState, WebServer};
