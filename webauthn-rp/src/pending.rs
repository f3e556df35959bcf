//! Pending-challenge storage: the relying party must remember which
//! options it sent to a client so a later `finish_*` call has something
//! to check the response against. This crate supplies the trait and a
//! minimal in-memory reference implementation; production deployments
//! with multiple RP instances should back this with shared storage
//! (a cache, a database row with a TTL index) instead.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use webauthn_rp_core::proto::options::{
    PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions,
};

/// Whichever kind of ceremony options a pending challenge was issued
/// for. Serializable so a caller can park it in a session cookie or a
/// shared cache instead of process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PendingCeremony {
    Registration(PublicKeyCredentialCreationOptions),
    Authentication(PublicKeyCredentialRequestOptions),
}

/// Storage for challenges that have been issued but not yet completed.
/// `key` is caller-chosen - typically the base64url challenge itself, or
/// a session id the challenge is attached to.
pub trait PendingChallengeStore: Send + Sync {
    fn insert(&self, key: String, ceremony: PendingCeremony, ttl: Duration);

    /// Remove and return the pending ceremony for `key`, if present and
    /// not yet expired. A challenge may only ever be taken once -
    /// replay of a `finish_*` call against the same challenge must find
    /// nothing.
    fn take(&self, key: &str) -> Option<PendingCeremony>;
}

#[derive(Default)]
pub struct InMemoryPendingChallengeStore {
    entries: Mutex<HashMap<String, (PendingCeremony, Instant)>>,
}

impl InMemoryPendingChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry whose TTL has elapsed. Callers with a long-lived
    /// store should run this periodically; `take` already skips expired
    /// entries, so this is only needed to bound memory growth from
    /// abandoned ceremonies.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, (_, expires)| *expires >= now);
    }
}

impl PendingChallengeStore for InMemoryPendingChallengeStore {
    fn insert(&self, key: String, ceremony: PendingCeremony, ttl: Duration) {
        let expires = Instant::now() + ttl;
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(key, (ceremony, expires));
    }

    fn take(&self, key: &str) -> Option<PendingCeremony> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match guard.remove(key) {
            Some((ceremony, expires)) if expires >= Instant::now() => Some(ceremony),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64urlsafedata::Base64UrlSafeData;
    use webauthn_rp_core::proto::options::{PublicKeyCredentialRequestOptions, UserVerificationPolicy};

    fn request_options() -> PublicKeyCredentialRequestOptions {
        PublicKeyCredentialRequestOptions {
            rp_id: "example.com".into(),
            challenge: Base64UrlSafeData::from(vec![1, 2, 3]),
            allow_credentials: vec![],
            user_verification: UserVerificationPolicy::Preferred,
        }
    }

    #[test]
    fn take_returns_none_after_first_take() {
        let store = InMemoryPendingChallengeStore::new();
        store.insert(
            "abc".into(),
            PendingCeremony::Authentication(request_options()),
            Duration::from_secs(60),
        );
        assert!(store.take("abc").is_some());
        assert!(store.take("abc").is_none());
    }

    #[test]
    fn take_returns_none_once_expired() {
        let store = InMemoryPendingChallengeStore::new();
        store.insert(
            "abc".into(),
            PendingCeremony::Authentication(request_options()),
            Duration::from_millis(0),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.take("abc").is_none());
    }
}
