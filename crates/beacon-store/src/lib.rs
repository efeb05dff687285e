//! # beacon-store
//!
//! SQLite persistence for the Beacon server: the `locations` and `messages`
//! tables that back the emergency map and the chat. The crate exposes a
//! synchronous `Database` handle that wraps a `rusqlite::Connection` and
//! provides typed CRUD helpers; the server owns the handle behind a mutex.

pub mod database;
pub mod locations;
pub mod messages;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
