use thiserror::Error;

use beacon_shared::ValidationError;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The operation requires a signed-in identity and none exists.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Sign-in was attempted and rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure talking to the server.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Rejected client-side before any network call.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The realtime subscription could not be opened or was lost.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// An operation was invoked in a state that does not allow it.
    #[error("No location is pending")]
    NoPendingLocation,
}

pub type Result<T> = std::result::Result<T, ClientError>;
