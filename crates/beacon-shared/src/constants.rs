/// Statement line embedded in the sign-in message presented to the wallet.
pub const SIGNIN_STATEMENT: &str = "Sign in with your wallet to coordinate emergency response";

/// Description attached to every donation payment command.
pub const DONATION_DESCRIPTION: &str = "You are donating for good cause";

/// Number of random bytes in a sign-in nonce (hex-encoded on the wire).
pub const NONCE_BYTES: usize = 16;
