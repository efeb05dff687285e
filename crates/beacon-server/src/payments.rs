//! Payment reference ledger.
//!
//! `POST /api/initiate-payment` records a pending reference; the wallet
//! executes the payment out of band; `POST /api/confirm-payment` verifies
//! the signed payload and flips the reference to confirmed. References
//! never confirmed are swept after a generous timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use beacon_shared::payment::{verify_payment, PaymentPayload, PaymentStatus};
use beacon_shared::types::WalletAddress;

enum PaymentState {
    Pending,
    Confirmed(PaymentPayload),
}

struct PaymentRecord {
    initiated_by: WalletAddress,
    initiated_at: Instant,
    state: PaymentState,
}

#[derive(Clone)]
pub struct PaymentLedger {
    records: Arc<Mutex<HashMap<Uuid, PaymentRecord>>>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a new pending reference for the given initiator.
    pub async fn initiate(&self, initiated_by: WalletAddress) -> Uuid {
        let reference = Uuid::new_v4();
        self.records.lock().await.insert(
            reference,
            PaymentRecord {
                initiated_by,
                initiated_at: Instant::now(),
                state: PaymentState::Pending,
            },
        );
        reference
    }

    /// Confirm a payment. Returns `true` only when the payload signature
    /// verifies, the reference is known and still pending, and the wallet
    /// reported success.
    pub async fn confirm(&self, payload: &PaymentPayload) -> bool {
        if payload.status != PaymentStatus::Success {
            warn!(reference = %payload.reference, "Payment reported as failed by wallet");
            return false;
        }

        if verify_payment(payload).is_err() {
            warn!(reference = %payload.reference, "Payment payload signature invalid");
            return false;
        }

        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&payload.reference) else {
            warn!(reference = %payload.reference, "Unknown payment reference");
            return false;
        };

        if !matches!(record.state, PaymentState::Pending) {
            return false;
        }

        record.state = PaymentState::Confirmed(payload.clone());
        info!(
            reference = %payload.reference,
            tx = %payload.transaction_id,
            initiator = %record.initiated_by,
            "Payment confirmed"
        );
        true
    }

    /// Evict pending references older than `max_age`. Confirmed records are
    /// kept for the lifetime of the process.
    pub async fn purge_stale(&self, max_age: Duration) {
        let mut records = self.records.lock().await;
        records.retain(|_, record| {
            matches!(record.state, PaymentState::Confirmed(_))
                || record.initiated_at.elapsed() < max_age
        });
    }
}

impl Default for PaymentLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_shared::payment::PayCommand;
    use beacon_shared::Wallet;

    #[tokio::test]
    async fn confirm_happy_path() {
        let ledger = PaymentLedger::new();
        let wallet = Wallet::generate();

        let reference = ledger.initiate(wallet.address()).await;
        let cmd = PayCommand::donation(reference, wallet.address(), 0.5).unwrap();
        let payload = wallet.pay(&cmd);

        assert!(ledger.confirm(&payload).await);
        // Second confirmation of the same reference is a no-op.
        assert!(!ledger.confirm(&payload).await);
    }

    #[tokio::test]
    async fn confirm_rejects_unknown_reference() {
        let ledger = PaymentLedger::new();
        let wallet = Wallet::generate();

        let cmd = PayCommand::donation(Uuid::new_v4(), wallet.address(), 0.5).unwrap();
        let payload = wallet.pay(&cmd);

        assert!(!ledger.confirm(&payload).await);
    }

    #[tokio::test]
    async fn confirm_rejects_tampered_payload() {
        let ledger = PaymentLedger::new();
        let wallet = Wallet::generate();

        let reference = ledger.initiate(wallet.address()).await;
        let cmd = PayCommand::donation(reference, wallet.address(), 0.5).unwrap();
        let mut payload = wallet.pay(&cmd);
        payload.transaction_id = "0x00".into();

        assert!(!ledger.confirm(&payload).await);
    }

    #[tokio::test]
    async fn purge_keeps_confirmed_records() {
        let ledger = PaymentLedger::new();
        let wallet = Wallet::generate();

        let pending = ledger.initiate(wallet.address()).await;
        let confirmed = ledger.initiate(wallet.address()).await;
        let cmd = PayCommand::donation(confirmed, wallet.address(), 1.0).unwrap();
        assert!(ledger.confirm(&wallet.pay(&cmd)).await);

        ledger.purge_stale(Duration::from_secs(0)).await;

        let records = ledger.records.lock().await;
        assert!(!records.contains_key(&pending));
        assert!(records.contains_key(&confirmed));
    }
}
