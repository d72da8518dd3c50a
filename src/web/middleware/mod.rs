//! Middleware and extractors for the Yak HTTP API.

pub mod cors;
pub mod session;

pub use cors::create_cors_layer;
pub use session::SessionCredential;
