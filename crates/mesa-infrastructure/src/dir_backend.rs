//! Directory-based durable session backend.
//!
//! One JSON file per session under `<base_dir>/sessions/`, with the
//! expiration instant stamped inside the envelope and checked on load.
//! Dedup claims are `create_new` marker files under `<base_dir>/claims/` —
//! the one place the storage layer itself must be atomic.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use mesa_core::session::Session;

use crate::backend::{SessionBackend, SessionEnvelope};

/// Durable session backend over a plain directory.
///
/// Directory structure:
/// ```text
/// base_dir/
/// ├── sessions/
/// │   ├── <session-key>.json
/// │   └── ...
/// └── claims/
///     └── <claim-key>.claim
/// ```
pub struct DirSessionBackend {
    base_dir: PathBuf,
}

impl DirSessionBackend {
    /// Creates the backend, ensuring the directory structure exists.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(base_dir.join("sessions"))
            .await
            .context("Failed to create sessions directory")?;
        fs::create_dir_all(base_dir.join("claims"))
            .await
            .context("Failed to create claims directory")?;

        Ok(Self { base_dir })
    }

    /// Creates the backend at the default location (~/.mesa).
    pub async fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::new(home_dir.join(".mesa")).await
    }

    fn session_path(&self, session_key: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.json", encode_key(session_key)))
    }

    fn claim_path(&self, claim_key: &str) -> PathBuf {
        self.base_dir
            .join("claims")
            .join(format!("{}.claim", encode_key(claim_key)))
    }

    /// Attempts the atomic create; `Ok(None)` means the file already exists.
    async fn create_claim_file(
        &self,
        path: &Path,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<()>> {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(mut file) => {
                file.write_all(expires_at.to_rfc3339().as_bytes())
                    .await
                    .context("Failed to write claim expiry")?;
                Ok(Some(()))
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err).context(format!("Failed to create claim file: {path:?}")),
        }
    }
}

#[async_trait]
impl SessionBackend for DirSessionBackend {
    async fn load(&self, session_key: &str) -> Result<Option<Session>> {
        let path = self.session_path(session_key);

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).context(format!("Failed to read session file: {path:?}"));
            }
        };

        let envelope: SessionEnvelope =
            serde_json::from_str(&json).context("Failed to deserialize session envelope")?;

        if envelope.expired(Utc::now()) {
            // Expired entries are deleted lazily on the next read.
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(envelope.session))
    }

    async fn store(&self, session: &Session, ttl: Duration) -> Result<()> {
        let path = self.session_path(&session.key);
        let envelope = SessionEnvelope::new(session.clone(), ttl);
        let json = serde_json::to_string_pretty(&envelope)
            .context("Failed to serialize session envelope")?;

        fs::write(&path, json)
            .await
            .context(format!("Failed to write session file: {path:?}"))?;

        Ok(())
    }

    async fn try_claim(&self, claim_key: &str, ttl: Duration) -> Result<bool> {
        let path = self.claim_path(claim_key);
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);

        if self.create_claim_file(&path, expires_at).await?.is_some() {
            return Ok(true);
        }

        // A marker exists; it only blocks the claim while unexpired.
        let stale = match fs::read_to_string(&path).await {
            Ok(stamp) => DateTime::parse_from_rfc3339(stamp.trim())
                .map(|t| t.with_timezone(&Utc) <= Utc::now())
                .unwrap_or(true),
            Err(_) => true,
        };

        if !stale {
            return Ok(false);
        }

        let _ = fs::remove_file(&path).await;
        Ok(self.create_claim_file(&path, expires_at).await?.is_some())
    }

    async fn remove(&self, session_key: &str) -> Result<()> {
        let path = self.session_path(session_key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context(format!("Failed to delete session file: {path:?}")),
        }
    }
}

/// Filesystem-safe key encoding: conservative characters pass through, the
/// rest become underscores, and a short hash suffix keeps distinct keys
/// from colliding after substitution.
fn encode_key(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    format!("{}-{:08x}", safe, hasher.finish() as u32)
}
