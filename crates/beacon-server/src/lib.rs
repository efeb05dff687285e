//! # beacon-server
//!
//! HTTP + realtime backend for the Beacon emergency platform. Plays the role
//! the original deployment delegated to managed services:
//!
//! - **Sign-in verification**: one-time nonces and wallet-signature checks,
//!   issuing bearer session tokens
//! - **Tables**: the `locations` and `messages` stores behind a REST surface
//! - **Realtime**: a WebSocket hub that pushes inserted-row events to
//!   subscribers, one topic per table
//! - **Payments**: reference issuance and signed confirmation recording
//! - **Per-IP rate limiting** to protect against abuse

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod payments;
pub mod rate_limit;
pub mod realtime;

pub use api::{build_router, serve, AppState};
pub use config::ServerConfig;
pub use error::ServerError;
