//! In-process session backend.
//!
//! Serves two roles: the degradation fallback behind the durable backend,
//! and the whole store in tests or single-instance deployments that accept
//! losing sessions on restart.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use mesa_core::session::Session;

use crate::backend::{SessionBackend, SessionEnvelope};

/// HashMap-backed backend with lazy expiry.
#[derive(Default)]
pub struct MemorySessionBackend {
    sessions: Mutex<HashMap<String, SessionEnvelope>>,
    claims: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) sessions. Test and metrics helper.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .lock()
            .await
            .values()
            .filter(|e| !e.expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn load(&self, session_key: &str) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(session_key) {
            Some(envelope) if envelope.expired(Utc::now()) => {
                sessions.remove(session_key);
                Ok(None)
            }
            Some(envelope) => Ok(Some(envelope.session.clone())),
            None => Ok(None),
        }
    }

    async fn store(&self, session: &Session, ttl: Duration) -> Result<()> {
        let envelope = SessionEnvelope::new(session.clone(), ttl);
        self.sessions
            .lock()
            .await
            .insert(session.key.clone(), envelope);
        Ok(())
    }

    async fn try_claim(&self, claim_key: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl.as_secs() as i64);
        let mut claims = self.claims.lock().await;

        match claims.get(claim_key) {
            Some(existing) if *existing > now => Ok(false),
            _ => {
                claims.insert(claim_key.to_string(), expires_at);
                Ok(true)
            }
        }
    }

    async fn remove(&self, session_key: &str) -> Result<()> {
        self.sessions.lock().await.remove(session_key);
        Ok(())
    }
}
