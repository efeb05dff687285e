use thiserror::Error;

// Carries f64 coordinates, so only PartialEq.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid severity: {0} (expected low, medium, high or critical)")]
    InvalidSeverity(String),

    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("Message content must not be blank")]
    BlankContent,

    #[error("A global message must not have a receiver")]
    GlobalWithReceiver,

    #[error("A direct message requires a receiver")]
    DirectWithoutReceiver,

    #[error("Donation amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Coordinates out of range: ({lat}, {lng})")]
    CoordinatesOutOfRange { lat: f64, lng: f64 },
}

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid key bytes")]
    InvalidKeyBytes,

    #[error("Signature verification failed")]
    BadSignature,

    #[error("Address does not match the signing key")]
    AddressMismatch,

    #[error("Sign-in message is malformed: {0}")]
    MalformedMessage(String),

    #[error("Nonce does not match")]
    NonceMismatch,

    #[error("Sign-in message has expired")]
    Expired,
}
