//! Sign-in nonces and bearer sessions.
//!
//! `GET /api/nonce` issues a one-time nonce; `POST /api/complete-siwe`
//! consumes it and, when the wallet signature checks out, hands back a
//! session token. Both stores are in-memory with TTL expiry and are swept
//! periodically from `main`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use beacon_shared::constants::NONCE_BYTES;
use beacon_shared::types::WalletAddress;

/// One-time sign-in nonces. A nonce can be consumed at most once and only
/// while fresh.
#[derive(Clone)]
pub struct NonceStore {
    issued: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            issued: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Issue a fresh nonce and remember it.
    pub async fn issue(&self) -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let nonce = hex::encode(bytes);

        self.issued.lock().await.insert(nonce.clone(), Instant::now());
        nonce
    }

    /// Consume a nonce. Returns `false` for unknown, already-used, or
    /// expired nonces.
    pub async fn consume(&self, nonce: &str) -> bool {
        let mut issued = self.issued.lock().await;
        match issued.remove(nonce) {
            Some(at) => at.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Evict expired nonces.
    pub async fn purge_expired(&self) {
        let mut issued = self.issued.lock().await;
        let ttl = self.ttl;
        issued.retain(|_, at| at.elapsed() < ttl);
    }
}

struct SessionEntry {
    address: WalletAddress,
    expires_at: Instant,
}

/// Bearer session tokens mapped to the authenticated wallet address.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Create a session for an authenticated address, returning its token.
    pub async fn issue(&self, address: WalletAddress) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.sessions.lock().await.insert(
            token.clone(),
            SessionEntry {
                address,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Resolve a bearer token to its wallet address, if the session is
    /// still live. Comparison is constant-time per candidate token.
    pub async fn resolve(&self, token: &str) -> Option<WalletAddress> {
        let now = Instant::now();
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .find(|(candidate, entry)| {
                entry.expires_at > now
                    && candidate.as_bytes().ct_eq(token.as_bytes()).unwrap_u8() == 1
            })
            .map(|(_, entry)| entry.address.clone())
    }

    /// Evict expired sessions.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> WalletAddress {
        WalletAddress::from_pubkey(&[seed; 32])
    }

    #[tokio::test]
    async fn nonce_is_single_use() {
        let store = NonceStore::new(Duration::from_secs(60));
        let nonce = store.issue().await;

        assert!(store.consume(&nonce).await);
        assert!(!store.consume(&nonce).await);
        assert!(!store.consume("never-issued").await);
    }

    #[tokio::test]
    async fn expired_nonce_is_rejected() {
        let store = NonceStore::new(Duration::from_secs(0));
        let nonce = store.issue().await;
        assert!(!store.consume(&nonce).await);
    }

    #[tokio::test]
    async fn session_resolves_until_expiry() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.issue(addr(1)).await;

        assert_eq!(store.resolve(&token).await, Some(addr(1)));
        assert_eq!(store.resolve("bogus").await, None);

        let short = SessionStore::new(Duration::from_secs(0));
        let token = short.issue(addr(2)).await;
        assert_eq!(short.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn purge_drops_expired_sessions() {
        let store = SessionStore::new(Duration::from_secs(0));
        let _ = store.issue(addr(1)).await;
        store.purge_expired().await;
        assert!(store.sessions.lock().await.is_empty());
    }
}
