//! Session storage backend trait.
//!
//! Defines the interface the session store facade talks to, decoupling the
//! governance core from the specific storage mechanism (directory of JSON
//! files, in-process map, a future database).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mesa_core::session::Session;

/// Stored shape: the session plus its absolute expiration instant. The TTL
/// is sliding — every `store` stamps a fresh `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub expires_at: DateTime<Utc>,
    pub session: Session,
}

impl SessionEnvelope {
    pub fn new(session: Session, ttl: Duration) -> Self {
        Self {
            expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
            session,
        }
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// An abstract storage backend for sessions and dedup claims.
///
/// `try_claim` is the only operation that must be atomic at the storage
/// layer; everything else is additionally protected by the pipeline's
/// per-session serialization and may be read-then-write.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Loads a live session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: session found and not expired
    /// - `Ok(None)`: unknown key, or the entry's TTL has lapsed
    /// - `Err(_)`: backend unavailable or corrupt data
    async fn load(&self, session_key: &str) -> Result<Option<Session>>;

    /// Saves a session, resetting its sliding TTL.
    async fn store(&self, session: &Session, ttl: Duration) -> Result<()>;

    /// Atomic "set if not exists" with expiration.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: the claim is new (first submission)
    /// - `Ok(false)`: an unexpired claim already exists
    /// - `Err(_)`: backend unavailable
    async fn try_claim(&self, claim_key: &str, ttl: Duration) -> Result<bool>;

    /// Deletes a session (operator action; normal flow never deletes).
    async fn remove(&self, session_key: &str) -> Result<()>;
}
