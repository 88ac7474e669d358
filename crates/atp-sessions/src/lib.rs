//! Session and token management (C8).
//!
//! A session record tracks what an `/init` call registered; a token proves
//! which tenant is calling without the gateway needing to look the session
//! up on every request.

pub mod store;
pub mod token;

pub use store::{SessionRecord, SessionStore};
pub use token::{TokenClaims, TokenManager};
