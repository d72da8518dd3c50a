//! Authentication module for Yak.
//!
//! Nick-based sessions: a nick logs in once and receives a bearer token.

mod session;

pub use session::{Session, SessionError, SessionStore, SessionToken, TOKEN_HEX_LEN};
