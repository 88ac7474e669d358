//! The HTTP surface over the execution engine (§6): request/response
//! wire shapes, session auth, and the CLI/bootstrap glue `main.rs` drives.
//! Exposed as a library (not just the `atp-gateway` binary) so integration
//! tests can drive the router with [`tower::ServiceExt::oneshot`] instead
//! of binding a real socket.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod state;
