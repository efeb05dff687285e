//! Wallet sign-in.

use chrono::{Duration, Utc};
use tracing::info;

use beacon_shared::constants::SIGNIN_STATEMENT;
use beacon_shared::types::WalletAddress;
use beacon_shared::Wallet;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};

/// An authenticated session: the wallet's address plus the bearer token the
/// server issued for it.
#[derive(Debug, Clone)]
pub struct Session {
    pub address: WalletAddress,
    pub token: String,
}

/// Run the full sign-in exchange: fetch a nonce, have the wallet sign the
/// canonical message, and submit the payload for verification.
///
/// Fails atomically. On any error the caller holds no session and no partial
/// state, exactly as if sign-in had never been attempted.
pub async fn sign_in(api: &ApiClient, wallet: &Wallet) -> Result<Session> {
    let nonce = api.nonce().await?;
    let payload = wallet.auth(&nonce, Utc::now() + Duration::hours(1), SIGNIN_STATEMENT);
    let verification = api.complete_siwe(payload, nonce).await?;

    if !verification.is_valid {
        return Err(ClientError::Auth("server rejected sign-in".to_string()));
    }
    let token = verification
        .session_token
        .ok_or_else(|| ClientError::Auth("verified sign-in carried no session token".to_string()))?;
    let address = verification
        .address
        .ok_or_else(|| ClientError::Auth("verified sign-in carried no address".to_string()))?;

    if address != wallet.address() {
        return Err(ClientError::Auth("session address does not match wallet".to_string()));
    }

    info!(address = %address.short(), "Signed in");
    Ok(Session { address, token })
}
