//! Turn records.
//!
//! A `TurnLog` is the immutable ground truth of one request/response cycle:
//! what arrived, what the classifier said, what the handler replied, and —
//! token for token, order for order — which buttons were actually
//! transmitted. Logs are created once and never mutated; replay and audit
//! read them instead of re-deriving anything from mutable session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::contract::Button;
use crate::event::{UserEvent, truncate_chars};
use crate::stage::Stage;

/// Violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

/// Machine-readable violation codes recorded on a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViolationCode {
    /// Request carried both modalities, or neither.
    MalformedEvent,
    /// Free text sent to a stage that does not accept it.
    TextNotAllowed,
    /// Button press sent to a stage that does not accept buttons.
    ButtonNotAllowed,
    /// Button token outside the stage's allowed set.
    UnknownButtonToken,
    /// Handler proposal altered by outgoing-button sanitization.
    ButtonsSanitized,
    /// Intent oracle timed out or failed; fallback path used.
    AdapterDegraded,
    /// Stage handler failed; turn aborted without a save.
    HandlerFault,
}

/// One contract violation observed while processing a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub severity: Severity,
    pub detail: String,
}

impl Violation {
    pub fn warning(code: ViolationCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            detail: detail.into(),
        }
    }

    pub fn info(code: ViolationCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Info,
            detail: detail.into(),
        }
    }

    pub fn fatal(code: ViolationCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Fatal,
            detail: detail.into(),
        }
    }
}

/// Why the turn ended where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransitionReason {
    /// Session bootstrap (greeting turn).
    Started,
    /// Handler moved the session forward.
    Advanced,
    /// Handler explicitly decided to stay in place.
    Stayed,
    /// Turn enforcer rejected the event; stage unchanged.
    Rejected,
    /// Fallback path used after a degraded classifier result.
    Degraded,
    /// Handler failed; session left unmodified.
    Fault,
}

/// Compact classifier outcome carried in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSummary {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

/// Everything `TurnLog::new` needs besides the generated id and timestamp.
#[derive(Debug, Clone)]
pub struct TurnLogParams {
    pub seq: u64,
    pub session_key: String,
    pub stage_before: Stage,
    pub event: UserEvent,
    pub intent: Option<IntentSummary>,
    pub reply: String,
    pub stage_after: Stage,
    pub buttons_shown: Vec<Button>,
    pub reason: TransitionReason,
    pub violations: Vec<Violation>,
    pub duration_ms: u64,
}

/// The immutable record of one processed request, accepted or rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnLog {
    pub turn_id: String,
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub session_key: String,
    pub stage_before: Stage,
    pub event: UserEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentSummary>,
    pub reply: String,
    pub stage_after: Stage,
    /// Exactly what was transmitted to the client, captured *after*
    /// outgoing-button sanitization.
    pub buttons_shown: Vec<Button>,
    pub reason: TransitionReason,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub duration_ms: u64,
}

impl TurnLog {
    /// Pure constructor: assigns a unique turn id and timestamp.
    pub fn new(params: TurnLogParams) -> Self {
        Self {
            turn_id: Uuid::new_v4().to_string(),
            seq: params.seq,
            at: Utc::now(),
            session_key: params.session_key,
            stage_before: params.stage_before,
            event: params.event,
            intent: params.intent,
            reply: params.reply,
            stage_after: params.stage_after,
            buttons_shown: params.buttons_shown,
            reason: params.reason,
            violations: params.violations,
            metadata: serde_json::Map::new(),
            duration_ms: params.duration_ms,
        }
    }

    pub fn has_fatal_violation(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Fatal)
    }

    /// An accepted turn carries no violations at all.
    pub fn accepted(&self) -> bool {
        !matches!(self.reason, TransitionReason::Rejected | TransitionReason::Fault)
    }
}

/// Flattened, analytics-oriented projection of a `TurnLog`. Write-once,
/// append-only, consumed by offline tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowLogEntry {
    /// Global sequence number across all sessions.
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub session_key: String,
    pub stage_before: Stage,
    pub input: String,
    /// Detected trigger: the button token, the classified intent, or
    /// plain "text".
    pub trigger: String,
    pub reply: String,
    pub stage_after: Stage,
    /// Server action tag (the transition reason).
    pub action: String,
    pub duration_ms: u64,
}

impl FlowLogEntry {
    /// Stable CSV column order for the operator export.
    pub const CSV_HEADER: &'static str =
        "seq,timestamp,session,stage_before,input,trigger,reply,stage_after,action,duration_ms";

    /// Projects a turn into one audit row.
    pub fn from_turn(
        turn: &TurnLog,
        global_seq: u64,
        input_preview_chars: usize,
        reply_preview_chars: usize,
    ) -> Self {
        let trigger = match turn.event.button_token() {
            Some(token) => token.to_string(),
            None => turn
                .intent
                .as_ref()
                .map(|i| i.label.clone())
                .unwrap_or_else(|| "text".to_string()),
        };
        Self {
            seq: global_seq,
            at: turn.at,
            session_key: turn.session_key.clone(),
            stage_before: turn.stage_before,
            input: turn.event.input_preview(input_preview_chars),
            trigger,
            reply: truncate_chars(&turn.reply, reply_preview_chars),
            stage_after: turn.stage_after,
            action: turn.reason.to_string(),
            duration_ms: turn.duration_ms,
        }
    }

    /// Renders one CSV row in the stable column order, without a trailing
    /// newline.
    pub fn csv_row(&self) -> String {
        [
            self.seq.to_string(),
            self.at.to_rfc3339(),
            csv_field(&self.session_key),
            self.stage_before.to_string(),
            csv_field(&self.input),
            csv_field(&self.trigger),
            csv_field(&self.reply),
            self.stage_after.to_string(),
            csv_field(&self.action),
            self.duration_ms.to_string(),
        ]
        .join(",")
    }
}

/// Minimal CSV quoting: fields containing separators, quotes, or newlines
/// are wrapped and inner quotes doubled.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_turn(reply: &str) -> TurnLog {
        TurnLog::new(TurnLogParams {
            seq: 3,
            session_key: "sess-1".to_string(),
            stage_before: Stage::AskProblem,
            event: UserEvent::text("mi compu no enciende", "mi compu no enciende", Utc::now()),
            intent: Some(IntentSummary {
                label: "describe_problem".to_string(),
                confidence: Some(0.8),
                degraded: None,
            }),
            reply: reply.to_string(),
            stage_after: Stage::AskDevice,
            buttons_shown: Vec::new(),
            reason: TransitionReason::Advanced,
            violations: Vec::new(),
            duration_ms: 12,
        })
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let a = sample_turn("ok");
        let b = sample_turn("ok");
        assert_ne!(a.turn_id, b.turn_id);
    }

    #[test]
    fn test_flow_entry_projects_trigger_and_truncates() {
        let turn = sample_turn("Entiendo. ¿Qué equipo es? Contame marca y modelo por favor.");
        let entry = FlowLogEntry::from_turn(&turn, 41, 80, 20);
        assert_eq!(entry.seq, 41);
        assert_eq!(entry.trigger, "describe_problem");
        assert_eq!(entry.reply.chars().count(), 20);
        assert_eq!(entry.stage_before, Stage::AskProblem);
        assert_eq!(entry.stage_after, Stage::AskDevice);
        assert_eq!(entry.action, "advanced");
    }

    #[test]
    fn test_button_turn_trigger_is_the_token() {
        let mut turn = sample_turn("ok");
        turn.event = UserEvent::button("BTN_YES", "Sí", Utc::now());
        let entry = FlowLogEntry::from_turn(&turn, 1, 80, 100);
        assert_eq!(entry.trigger, "BTN_YES");
        assert_eq!(entry.input, "[BUTTON: BTN_YES]");
    }

    #[test]
    fn test_csv_row_order_and_quoting() {
        let turn = sample_turn("hola, \"mundo\"");
        let entry = FlowLogEntry::from_turn(&turn, 7, 80, 100);
        let row = entry.csv_row();
        assert!(row.starts_with("7,"));
        assert!(row.contains("ask_problem"));
        assert!(row.contains("\"hola, \"\"mundo\"\"\""));
        assert_eq!(FlowLogEntry::CSV_HEADER.split(',').count(), 10);

        // A row without quoted fields has exactly the header's column count.
        let plain = FlowLogEntry::from_turn(&sample_turn("ok"), 8, 80, 100);
        assert_eq!(plain.csv_row().split(',').count(), 10);
    }

    #[test]
    fn test_fatal_violation_detection() {
        let mut turn = sample_turn("ok");
        assert!(!turn.has_fatal_violation());
        turn.violations
            .push(Violation::fatal(ViolationCode::HandlerFault, "boom"));
        assert!(turn.has_fatal_violation());
    }
}
