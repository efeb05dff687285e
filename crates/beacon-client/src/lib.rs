//! # beacon-client
//!
//! Client library for the Beacon emergency platform. Implements the pieces
//! the UI composes:
//!
//! - wallet sign-in producing a [`session::Session`]
//! - the [`locations::LocationStore`] mirror of reported emergencies
//! - the [`chat::MessagingChannel`] with its live subscription
//! - the [`intake::IntakeFlow`] form state machine
//! - the [`stats::StatsAggregator`] region fold over reverse geocoding
//! - the [`payments::donate`] trigger
//!
//! Each piece is a plain struct created on mount and dropped on unmount;
//! there is no process-wide state. User-facing success/error notices flow
//! through the [`events`] channel.

pub mod api;
pub mod chat;
pub mod error;
pub mod events;
pub mod geocode;
pub mod intake;
pub mod locations;
pub mod payments;
pub mod session;
pub mod stats;
pub mod subscription;

pub use api::ApiClient;
pub use error::ClientError;
pub use session::Session;
