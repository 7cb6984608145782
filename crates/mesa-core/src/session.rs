//! Session domain model.
//!
//! A `Session` is an immutable value from the pipeline's point of view:
//! handlers receive an owned copy and return a new one, and the pipeline
//! owns the single commit point into the store. Nothing mutates stored
//! state through a live reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::turn::TurnLog;

/// Reply language chosen at the start of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    EsAr,
    EsEs,
    En,
}

/// What the user came for: a broken thing, or help doing something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    Help,
    Task,
}

/// Outcome of the latest self-service test round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestsOutcome {
    /// Ran the steps, problem persists.
    StillBroken,
    /// Could not run the steps.
    NotRun,
    /// Steps fixed it.
    Solved,
}

/// The business-data bag collected over the conversation. The pipeline
/// never interprets it; only stage handlers read and write it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub need: Option<Need>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub tests: Option<TestsOutcome>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
}

impl Profile {
    /// Language with the pre-selection default (the bot greets in es-AR).
    pub fn language_or_default(&self) -> Language {
        self.language.unwrap_or(Language::EsAr)
    }
}

/// The long-lived, per-user conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session key, stable for the conversation's lifetime.
    pub key: String,
    /// Current stage; always one of the contract table's known stages.
    pub stage: Stage,
    /// Business data collected by handlers.
    #[serde(default)]
    pub profile: Profile,
    /// Bounded transcript of prior turns, oldest dropped past the cap.
    #[serde(default)]
    pub transcript: Vec<TurnLog>,
    /// Monotonically non-decreasing turn counter; +1 per applied turn.
    #[serde(default)]
    pub turn_seq: u64,
    pub created_at: DateTime<Utc>,
    /// Updated on every successful save; drives sliding expiration.
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh session in the initial stage.
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            stage: Stage::initial(),
            profile: Profile::default(),
            transcript: Vec::new(),
            turn_seq: 0,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Returns a copy advanced to `stage`. Handler convenience.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Returns a copy with the profile replaced. Handler convenience.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// The sequence number the next applied turn will carry.
    pub fn next_seq(&self) -> u64 {
        self.turn_seq + 1
    }

    /// Commits one turn's bookkeeping: appends the log to the bounded
    /// transcript, advances the turn counter, and refreshes the activity
    /// timestamp. Called exactly once per applied turn, by the pipeline,
    /// right before the save.
    pub fn record_turn(&mut self, log: TurnLog, transcript_cap: usize) {
        self.turn_seq = log.seq;
        self.last_activity_at = log.at;
        self.transcript.push(log);
        if self.transcript.len() > transcript_cap {
            let excess = self.transcript.len() - transcript_cap;
            self.transcript.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::{TransitionReason, TurnLog, TurnLogParams};

    fn turn(seq: u64, key: &str) -> TurnLog {
        TurnLog::new(TurnLogParams {
            seq,
            session_key: key.to_string(),
            stage_before: Stage::AskLanguage,
            event: crate::event::UserEvent::text("hola", "hola", Utc::now()),
            intent: None,
            reply: "¡Hola!".to_string(),
            stage_after: Stage::AskLanguage,
            buttons_shown: Vec::new(),
            reason: TransitionReason::Stayed,
            violations: Vec::new(),
            duration_ms: 1,
        })
    }

    #[test]
    fn test_new_session_starts_at_initial_stage() {
        let session = Session::new("abc", Utc::now());
        assert_eq!(session.stage, Stage::initial());
        assert_eq!(session.turn_seq, 0);
        assert!(session.transcript.is_empty());
    }

    #[test]
    fn test_record_turn_advances_counter_and_caps_transcript() {
        let mut session = Session::new("abc", Utc::now());
        for seq in 1..=5 {
            session.record_turn(turn(seq, "abc"), 3);
        }
        assert_eq!(session.turn_seq, 5);
        assert_eq!(session.transcript.len(), 3);
        // Oldest entries dropped, order preserved.
        let seqs: Vec<u64> = session.transcript.iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[test]
    fn test_with_stage_returns_new_value() {
        let session = Session::new("abc", Utc::now());
        let advanced = session.clone().with_stage(Stage::AskName);
        assert_eq!(session.stage, Stage::AskLanguage);
        assert_eq!(advanced.stage, Stage::AskName);
    }
}
