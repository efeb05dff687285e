//! Payment commands handed to the wallet and the signed payload it returns.
//!
//! A donation is fire-and-forget: the server issues a reference id, the
//! wallet signs a payment for that reference, and the confirmation endpoint
//! records the signed result. No donation history is kept client-side.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DONATION_DESCRIPTION;
use crate::error::{ValidationError, WalletError};
use crate::types::WalletAddress;
use crate::wallet::Wallet;

/// Supported token denominations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenSymbol {
    #[serde(rename = "WLD")]
    Wld,
    #[serde(rename = "USDCE")]
    UsdCe,
}

impl TokenSymbol {
    pub fn decimals(&self) -> u32 {
        match self {
            TokenSymbol::Wld => 18,
            TokenSymbol::UsdCe => 6,
        }
    }
}

/// Convert a human amount into the token's integer base units, as a decimal
/// string.
pub fn token_to_decimals(amount: f64, token: TokenSymbol) -> String {
    let scaled = amount * 10f64.powi(token.decimals() as i32);
    format!("{}", scaled.round() as u128)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenAmount {
    pub symbol: TokenSymbol,
    /// Integer base units as a decimal string.
    pub token_amount: String,
}

/// The command handed to the wallet to execute a payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayCommand {
    /// Server-issued payment reference.
    pub reference: Uuid,
    pub to: WalletAddress,
    pub tokens: Vec<TokenAmount>,
    pub description: String,
}

impl PayCommand {
    /// Build a donation command in both supported denominations.
    /// Rejects non-positive amounts before anything touches the network.
    pub fn donation(
        reference: Uuid,
        to: WalletAddress,
        amount: f64,
    ) -> Result<Self, ValidationError> {
        if !(amount > 0.0) {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(Self {
            reference,
            to,
            tokens: vec![
                TokenAmount {
                    symbol: TokenSymbol::Wld,
                    token_amount: token_to_decimals(amount, TokenSymbol::Wld),
                },
                TokenAmount {
                    symbol: TokenSymbol::UsdCe,
                    token_amount: token_to_decimals(amount, TokenSymbol::UsdCe),
                },
            ],
            description: DONATION_DESCRIPTION.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Error,
}

/// The wallet's final payload after executing a payment command, posted to
/// the confirmation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentPayload {
    pub reference: Uuid,
    /// Hex-encoded public key of the paying wallet.
    pub payer_public_key: String,
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// Hex-encoded signature over [`payment_signing_bytes`].
    pub signature: String,
}

/// The bytes the wallet signs when confirming a payment.
pub fn payment_signing_bytes(reference: &Uuid, transaction_id: &str, status: PaymentStatus) -> Vec<u8> {
    let status = match status {
        PaymentStatus::Success => "success",
        PaymentStatus::Error => "error",
    };
    format!("pay:{reference}:{transaction_id}:{status}").into_bytes()
}

impl Wallet {
    /// Execute a payment command, returning the signed final payload.
    pub fn pay(&self, command: &PayCommand) -> PaymentPayload {
        let mut tx = [0u8; 32];
        rand::Rng::fill(&mut rand::rngs::OsRng, &mut tx);
        let transaction_id = format!("0x{}", hex::encode(tx));

        let status = PaymentStatus::Success;
        let signature = self.sign(&payment_signing_bytes(
            &command.reference,
            &transaction_id,
            status,
        ));

        PaymentPayload {
            reference: command.reference,
            payer_public_key: hex::encode(self.public_key_bytes()),
            transaction_id,
            status,
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

/// Verify that a confirmation payload was signed by the wallet it names.
pub fn verify_payment(payload: &PaymentPayload) -> Result<(), WalletError> {
    let pubkey: [u8; 32] = hex::decode(&payload.payer_public_key)
        .map_err(|_| WalletError::InvalidKeyBytes)?
        .try_into()
        .map_err(|_| WalletError::InvalidKeyBytes)?;
    let verifying_key =
        VerifyingKey::from_bytes(&pubkey).map_err(|_| WalletError::InvalidKeyBytes)?;

    let sig_bytes = hex::decode(&payload.signature).map_err(|_| WalletError::BadSignature)?;
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| WalletError::BadSignature)?;

    verifying_key
        .verify(
            &payment_signing_bytes(&payload.reference, &payload.transaction_id, payload.status),
            &signature,
        )
        .map_err(|_| WalletError::BadSignature)
}
