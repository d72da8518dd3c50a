//! Chat module for Yak.
//!
//! This module provides the real-time relay:
//! - Messages and broadcast events
//! - The broadcaster with history replay for late joiners
//! - Periodic heartbeats
//! - Message ingress (session check, normalization, command hand-off)

mod broadcaster;
mod heartbeat;
mod ingress;
mod message;

pub use broadcaster::{Broadcaster, SubscriberId, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
pub use heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL_MS};
pub use ingress::{normalize_body, IncomingPost, IngressError, MessageIngress, PostReceipt};
pub use message::{ContentType, Event, Frame, Liveness, Message, BOT_NICK};
