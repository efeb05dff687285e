//! # beacon-shared
//!
//! Domain types shared between the Beacon server and client: wallet
//! identities, emergency locations, chat messages, payment commands, and the
//! realtime wire protocol.
//!
//! The wallet address string is the sole user key throughout the system; it
//! is derived from an Ed25519 public key and every authenticated action is
//! ultimately backed by a signature from that key.

pub mod constants;
pub mod error;
pub mod payment;
pub mod protocol;
pub mod types;
pub mod wallet;

pub use error::{ValidationError, WalletError};
pub use types::{Conversation, EmergencyInfo, Location, Message, Severity, WalletAddress};
pub use wallet::Wallet;
