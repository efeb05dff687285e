//! Realtime wire protocol between the server's change hub and subscribed
//! clients. Frames travel as JSON text over a WebSocket.

use serde::{Deserialize, Serialize};

use crate::types::{Location, Message};

/// A subscription topic: one table, insert events only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Messages,
    Locations,
}

/// First frame a client sends after connecting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub topic: Topic,
}

/// An inserted-row event pushed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "row", rename_all = "snake_case")]
pub enum ChangeEvent {
    MessageInserted(Message),
    LocationInserted(Location),
}

impl ChangeEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ChangeEvent::MessageInserted(_) => Topic::Messages,
            ChangeEvent::LocationInserted(_) => Topic::Locations,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
