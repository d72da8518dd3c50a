//! HTTP surface for Yak.
//!
//! Login, message posting, the live event stream (server-sent events), and
//! the command list used for client-side autocomplete.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
