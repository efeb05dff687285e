use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::types::WalletAddress;

/// A user's wallet, modelled as an Ed25519 keypair. Stands in for the
/// external wallet SDK: it signs the sign-in message and payment commands,
/// and the derived address is the user's identity everywhere else.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
}

/// The signed payload the wallet hands back from a sign-in request. The
/// server verifies it against the nonce it issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub address: WalletAddress,
    /// Hex-encoded 32-byte Ed25519 public key.
    pub public_key: String,
    /// The full sign-in message that was signed.
    pub message: String,
    /// Hex-encoded signature over `message`.
    pub signature: String,
}

impl Wallet {
    /// Generate a fresh wallet.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a wallet from secret key bytes.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// The wallet address derived from the public key.
    pub fn address(&self) -> WalletAddress {
        WalletAddress::from_pubkey(&self.public_key_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Produce a signed sign-in payload for the given server-issued nonce.
    pub fn auth(&self, nonce: &str, expiration: DateTime<Utc>, statement: &str) -> AuthPayload {
        let address = self.address();
        let message = signin_message(&address, statement, nonce, expiration);
        let signature = self.sign(message.as_bytes());
        AuthPayload {
            address,
            public_key: hex::encode(self.public_key_bytes()),
            message,
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

/// Build the canonical sign-in message. Both sides produce the exact same
/// bytes so the signature can be checked against the reconstruction.
pub fn signin_message(
    address: &WalletAddress,
    statement: &str,
    nonce: &str,
    expiration: DateTime<Utc>,
) -> String {
    format!(
        "beacon wants you to sign in with your wallet:\n{address}\n\n{statement}\n\nNonce: {nonce}\nExpiration Time: {}",
        expiration.to_rfc3339()
    )
}

/// Verify a sign-in payload against the nonce the server issued.
///
/// Checks, in order: the public key decodes, the address matches the key,
/// the signature covers the message, the message carries the expected nonce,
/// and the embedded expiration has not passed. On success returns the
/// authenticated address.
pub fn verify_auth(payload: &AuthPayload, expected_nonce: &str) -> Result<WalletAddress, WalletError> {
    let pubkey = decode_pubkey(&payload.public_key)?;
    let verifying_key =
        VerifyingKey::from_bytes(&pubkey).map_err(|_| WalletError::InvalidKeyBytes)?;

    if WalletAddress::from_pubkey(&pubkey) != payload.address {
        return Err(WalletError::AddressMismatch);
    }

    let sig_bytes = hex::decode(&payload.signature).map_err(|_| WalletError::BadSignature)?;
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| WalletError::BadSignature)?;
    verifying_key
        .verify(payload.message.as_bytes(), &signature)
        .map_err(|_| WalletError::BadSignature)?;

    let nonce = message_field(&payload.message, "Nonce: ")?;
    if nonce != expected_nonce {
        return Err(WalletError::NonceMismatch);
    }

    let expiration_raw = message_field(&payload.message, "Expiration Time: ")?;
    let expiration = DateTime::parse_from_rfc3339(&expiration_raw)
        .map_err(|e| WalletError::MalformedMessage(e.to_string()))?;
    if Utc::now() > expiration {
        return Err(WalletError::Expired);
    }

    Ok(payload.address.clone())
}

fn decode_pubkey(hex_str: &str) -> Result<[u8; 32], WalletError> {
    let bytes = hex::decode(hex_str).map_err(|_| WalletError::InvalidKeyBytes)?;
    bytes.try_into().map_err(|_| WalletError::InvalidKeyBytes)
}

fn message_field(message: &str, prefix: &str) -> Result<String, WalletError> {
    message
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::to_string)
        .ok_or_else(|| WalletError::MalformedMessage(format!("missing line `{prefix}`")))
}
