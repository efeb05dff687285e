use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// User identity = "0x" + 40 lowercase hex chars (20 bytes derived from the
// wallet's Ed25519 public key).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalise an address string.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim().to_ascii_lowercase();
        let hex_part = s
            .strip_prefix("0x")
            .ok_or_else(|| ValidationError::InvalidAddress(s.clone()))?;
        if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidAddress(s));
        }
        Ok(Self(s))
    }

    /// Derive the address for an Ed25519 public key: first 20 bytes of
    /// `blake3(pubkey)`, hex-encoded.
    pub fn from_pubkey(pubkey: &[u8; 32]) -> Self {
        let hash = blake3::hash(pubkey);
        Self(format!("0x{}", hex::encode(&hash.as_bytes()[..20])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display: `0x1234…abcd`.
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<WalletAddress> for String {
    fn from(a: WalletAddress) -> String {
        a.0
    }
}

/// Severity of a reported emergency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ValidationError::InvalidSeverity(other.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured metadata attached to a reported location at creation time.
/// Never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyInfo {
    #[serde(rename = "type")]
    pub emergency_type: String,
    pub description: String,
    pub severity: Severity,
    /// Free-form ("10", "5-10", "more than 20"); parsed best-effort for
    /// aggregation.
    pub people_affected: String,
    pub contact_info: String,
}

impl EmergencyInfo {
    /// All five fields are required; the text fields must be non-empty after
    /// trimming.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.emergency_type.trim().is_empty() {
            return Err(ValidationError::EmptyField("type"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyField("description"));
        }
        if self.people_affected.trim().is_empty() {
            return Err(ValidationError::EmptyField("peopleAffected"));
        }
        if self.contact_info.trim().is_empty() {
            return Err(ValidationError::EmptyField("contactInfo"));
        }
        Ok(())
    }

    /// Best-effort integer parse of `people_affected`: the leading digit run
    /// ("5-10" parses as 5), defaulting to 1 when nothing parses.
    pub fn people_count(&self) -> u64 {
        let digits: String = self
            .people_affected
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(1).max(1)
    }
}

/// A reported emergency location. Immutable after creation; the only removal
/// path is a bulk clear scoped to the owner's address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub wallet_address: WalletAddress,
    pub lat: f64,
    pub lng: f64,
    pub emergency_info: Option<EmergencyInfo>,
}

impl Location {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::CoordinatesOutOfRange {
                lat: self.lat,
                lng: self.lng,
            });
        }
        if let Some(ref info) = self.emergency_info {
            info.validate()?;
        }
        Ok(())
    }
}

/// A single chat message. Partitioned into exactly one of the global stream
/// or a pairwise direct conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned, unique.
    pub id: Uuid,
    pub content: String,
    pub sender_address: WalletAddress,
    /// `None` iff the message is global.
    pub receiver_address: Option<WalletAddress>,
    pub created_at: DateTime<Utc>,
    pub is_global: bool,
}

impl Message {
    /// Invariant check: `is_global` ⇔ no receiver.
    pub fn is_well_formed(&self) -> bool {
        self.is_global == self.receiver_address.is_none()
    }

    /// Whether this message belongs to the given conversation as seen by
    /// `me`. Direct matching is the exact unordered pair {me, peer}.
    pub fn matches(&self, me: &WalletAddress, conversation: &Conversation) -> bool {
        match conversation {
            Conversation::Global => self.is_global,
            Conversation::Direct(peer) => {
                if self.is_global {
                    return false;
                }
                let Some(ref receiver) = self.receiver_address else {
                    return false;
                };
                (self.sender_address == *me && receiver == peer)
                    || (self.sender_address == *peer && receiver == me)
            }
        }
    }
}

/// The view key for a message list: the single global stream, or a pairwise
/// direct conversation with one peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conversation {
    Global,
    Direct(WalletAddress),
}

impl Conversation {
    pub fn is_global(&self) -> bool {
        matches!(self, Conversation::Global)
    }

    /// The receiver to stamp on an outgoing message in this conversation.
    pub fn receiver(&self) -> Option<&WalletAddress> {
        match self {
            Conversation::Global => None,
            Conversation::Direct(peer) => Some(peer),
        }
    }
}
