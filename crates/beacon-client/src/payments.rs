//! Donation flow.

use tracing::{info, warn};

use beacon_shared::payment::{PayCommand, PaymentStatus};
use beacon_shared::types::WalletAddress;
use beacon_shared::{ValidationError, Wallet};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::session::Session;

/// Donate `amount` tokens to `to`.
///
/// The amount is validated before anything touches the network. The flow is
/// initiate (server issues a reference), pay (wallet signs for that
/// reference), confirm (server verifies the signed payload). Returns whether
/// the server accepted the donation.
pub async fn donate(
    api: &ApiClient,
    session: &Session,
    wallet: &Wallet,
    to: &WalletAddress,
    amount: f64,
) -> Result<bool> {
    if !(amount > 0.0) {
        return Err(ClientError::Validation(ValidationError::NonPositiveAmount));
    }
    let api = api.with_token(&session.token);

    let reference = api.initiate_payment().await?;
    let command = PayCommand::donation(reference, to.clone(), amount)?;
    let payload = wallet.pay(&command);

    if payload.status != PaymentStatus::Success {
        warn!(%reference, "Wallet declined the payment");
        return Ok(false);
    }

    let accepted = api.confirm_payment(&payload).await?;
    if accepted {
        info!(%reference, amount, "Donation confirmed");
    } else {
        warn!(%reference, "Server rejected the payment confirmation");
    }
    Ok(accepted)
}
