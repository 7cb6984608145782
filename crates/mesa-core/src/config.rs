//! Pipeline configuration.
//!
//! All tunables are collected in a single struct constructed once at process
//! start and passed by reference into the request pipeline. Nothing in the
//! pipeline or the handlers reads ambient global state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for the conversation governance pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Sliding session TTL in seconds. Reset on every successful save.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// TTL in seconds for idempotency claims and cached responses.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,

    /// Hard timeout for one intent-classifier call, in milliseconds.
    #[serde(default = "default_intent_timeout_ms")]
    pub intent_timeout_ms: u64,

    /// Maximum turns kept in a session's own transcript.
    #[serde(default = "default_transcript_cap")]
    pub transcript_cap: usize,

    /// Sliding-window size for loop detection over the flow audit stream.
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,

    /// Maximum characters of user input mirrored into a flow log row.
    #[serde(default = "default_input_preview_chars")]
    pub input_preview_chars: usize,

    /// Maximum characters of bot reply mirrored into a flow log row.
    #[serde(default = "default_reply_preview_chars")]
    pub reply_preview_chars: usize,

    /// Per-session tail length kept in memory by the flow audit stream.
    #[serde(default = "default_audit_tail_cap")]
    pub audit_tail_cap: usize,

    /// Base directory for durable data (sessions, claims, audit CSV).
    /// `None` means the backend's default location.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Whether turn responses carry the `debug` block.
    #[serde(default)]
    pub debug_responses: bool,
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_dedup_ttl_secs() -> u64 {
    30
}

fn default_intent_timeout_ms() -> u64 {
    1500
}

fn default_transcript_cap() -> usize {
    40
}

fn default_loop_window() -> usize {
    3
}

fn default_input_preview_chars() -> usize {
    80
}

fn default_reply_preview_chars() -> usize {
    100
}

fn default_audit_tail_cap() -> usize {
    64
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            intent_timeout_ms: default_intent_timeout_ms(),
            transcript_cap: default_transcript_cap(),
            loop_window: default_loop_window(),
            input_preview_chars: default_input_preview_chars(),
            reply_preview_chars: default_reply_preview_chars(),
            audit_tail_cap: default_audit_tail_cap(),
            data_dir: None,
            debug_responses: false,
        }
    }
}

impl FlowConfig {
    /// Parses a configuration from TOML text. Missing keys fall back to
    /// their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Session TTL as a `std::time::Duration`.
    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_ttl_secs)
    }

    /// Dedup claim TTL as a `std::time::Duration`.
    pub fn dedup_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dedup_ttl_secs)
    }

    /// Intent classifier timeout as a `std::time::Duration`.
    pub fn intent_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.intent_timeout_ms)
    }
}
