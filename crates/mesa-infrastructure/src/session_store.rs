//! Session store facade.
//!
//! Wraps the durable backend with an in-process fallback: backend errors
//! degrade to the fallback with a logged warning instead of failing the
//! request, trading durability for availability. A failed dedup claim on
//! the durable side falls through to the in-process claim table, so
//! conversation progress is never blocked by storage trouble.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mesa_core::session::Session;

use crate::backend::SessionBackend;
use crate::memory_backend::MemorySessionBackend;

/// Where a successful write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// The durable backend took the write.
    Durable,
    /// The durable backend failed; the in-process fallback holds the data.
    Fallback,
}

/// Dedup claim verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// First submission of this `(session, idempotency key)` pair.
    Claimed,
    /// An unexpired claim already exists: duplicate request.
    AlreadyClaimed,
}

/// Keyed get/put of session state with degradation handling.
pub struct SessionStore {
    primary: Arc<dyn SessionBackend>,
    fallback: MemorySessionBackend,
    /// Set while the primary backend is failing, cleared on recovery, so
    /// the standing degradation is logged on transitions rather than on
    /// every call.
    degraded: AtomicBool,
}

impl SessionStore {
    pub fn new(primary: Arc<dyn SessionBackend>) -> Self {
        Self {
            primary,
            fallback: MemorySessionBackend::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// A store with no durable backend at all (tests, ephemeral deploys).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionBackend::new()))
    }

    fn note_degraded(&self, operation: &str, err: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                target: "session_store",
                "Durable backend degraded on {operation}, serving from in-process fallback: {err:#}"
            );
        } else {
            tracing::debug!(target: "session_store", "Still degraded on {operation}: {err:#}");
        }
    }

    fn note_recovered(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            tracing::info!(target: "session_store", "Durable backend recovered");
        }
    }

    /// Whether the last primary-backend call failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Loads a session. Backend trouble is absorbed: the caller only sees
    /// "found" or "not found".
    pub async fn get(&self, session_key: &str) -> Option<Session> {
        match self.primary.load(session_key).await {
            Ok(found) => {
                self.note_recovered();
                found
            }
            Err(err) => {
                self.note_degraded("get", &err);
                self.fallback.load(session_key).await.ok().flatten()
            }
        }
    }

    /// Saves a session, resetting the sliding TTL. Never fails the request:
    /// the result says where the write landed.
    pub async fn put(&self, session: &Session, ttl: Duration) -> StoreStatus {
        match self.primary.store(session, ttl).await {
            Ok(()) => {
                self.note_recovered();
                StoreStatus::Durable
            }
            Err(err) => {
                self.note_degraded("put", &err);
                if let Err(fallback_err) = self.fallback.store(session, ttl).await {
                    // The in-process map cannot realistically fail, but the
                    // branch must be explicit rather than swallowed.
                    tracing::error!(
                        target: "session_store",
                        "Fallback store failed, session {} lost for this turn: {fallback_err:#}",
                        session.key
                    );
                }
                StoreStatus::Fallback
            }
        }
    }

    /// Atomically claims `(session_key, idempotency_key)`. When the durable
    /// backend is unreachable the in-process claim table still catches
    /// same-instance duplicates; if that could not decide either, the
    /// verdict defaults to `Claimed` — conversation progress beats perfect
    /// dedup.
    pub async fn try_claim(
        &self,
        session_key: &str,
        idempotency_key: &str,
        ttl: Duration,
    ) -> ClaimOutcome {
        let claim_key = format!("{session_key}:{idempotency_key}");

        match self.primary.try_claim(&claim_key, ttl).await {
            Ok(true) => {
                self.note_recovered();
                ClaimOutcome::Claimed
            }
            Ok(false) => {
                self.note_recovered();
                ClaimOutcome::AlreadyClaimed
            }
            Err(err) => {
                self.note_degraded("try_claim", &err);
                match self.fallback.try_claim(&claim_key, ttl).await {
                    Ok(true) | Err(_) => ClaimOutcome::Claimed,
                    Ok(false) => ClaimOutcome::AlreadyClaimed,
                }
            }
        }
    }

    /// Operator-level session deletion.
    pub async fn remove(&self, session_key: &str) {
        if let Err(err) = self.primary.remove(session_key).await {
            self.note_degraded("remove", &err);
        }
        let _ = self.fallback.remove(session_key).await;
    }
}
