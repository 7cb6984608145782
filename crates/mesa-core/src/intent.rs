//! Intent classification boundary.
//!
//! The conversation core never calls an NLU service directly; it consumes a
//! typed `IntentResult` from an `IntentClassifier`. A degraded oracle is a
//! first-class value, not an error — every stage that consumes intent has a
//! defined behavior for it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::session::Language;
use crate::stage::Stage;
use crate::turn::IntentSummary;

/// Coarse intents the triage flow reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    ProvideName,
    SkipName,
    DescribeProblem,
    DescribeDevice,
    ProvideContact,
    Affirm,
    Deny,
    Solved,
    Unknown,
}

/// Why the oracle degraded instead of classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DegradedReason {
    Timeout,
    Unavailable,
    MalformedResponse,
}

/// Typed classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntentResult {
    /// The oracle answered.
    Classified {
        intent: Intent,
        confidence: f32,
        #[serde(default)]
        fields: HashMap<String, String>,
    },
    /// The oracle timed out or errored; callers take the fallback path.
    Degraded {
        reason: DegradedReason,
        #[serde(default)]
        detail: String,
    },
    /// The event did not consult the oracle (button presses).
    Skipped,
}

impl IntentResult {
    pub fn classified(intent: Intent, confidence: f32) -> Self {
        Self::Classified {
            intent,
            confidence,
            fields: HashMap::new(),
        }
    }

    pub fn degraded(reason: DegradedReason, detail: impl Into<String>) -> Self {
        Self::Degraded {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The classified intent, if the oracle answered.
    pub fn intent(&self) -> Option<Intent> {
        match self {
            Self::Classified { intent, .. } => Some(*intent),
            _ => None,
        }
    }

    /// Compact form for the turn log. `Skipped` leaves no trace.
    pub fn summary(&self) -> Option<IntentSummary> {
        match self {
            Self::Classified {
                intent, confidence, ..
            } => Some(IntentSummary {
                label: intent.to_string(),
                confidence: Some(*confidence),
                degraded: None,
            }),
            Self::Degraded { reason, detail } => Some(IntentSummary {
                label: "degraded".to_string(),
                confidence: None,
                degraded: Some(if detail.is_empty() {
                    reason.to_string()
                } else {
                    format!("{reason}: {detail}")
                }),
            }),
            Self::Skipped => None,
        }
    }
}

/// Session context handed to the oracle alongside the text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentContext {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

/// The external intent/NLU oracle boundary.
///
/// Implementations never return an error: any failure mode is expressed as
/// `IntentResult::Degraded`. The hard call timeout is enforced by the
/// caller, not the implementation.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, normalized_text: &str, ctx: &IntentContext) -> IntentResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_classified_result() {
        let result = IntentResult::classified(Intent::DescribeProblem, 0.85);
        let summary = result.summary().unwrap();
        assert_eq!(summary.label, "describe_problem");
        assert_eq!(summary.confidence, Some(0.85));
        assert!(summary.degraded.is_none());
    }

    #[test]
    fn test_summary_of_degraded_result() {
        let result = IntentResult::degraded(DegradedReason::Timeout, "1500ms elapsed");
        assert!(result.is_degraded());
        assert!(result.intent().is_none());
        let summary = result.summary().unwrap();
        assert_eq!(summary.degraded.as_deref(), Some("timeout: 1500ms elapsed"));
    }

    #[test]
    fn test_skipped_leaves_no_summary() {
        assert!(IntentResult::Skipped.summary().is_none());
    }
}
