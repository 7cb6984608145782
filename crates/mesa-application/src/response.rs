//! Outbound response schema.
//!
//! The shape handed to the transport layer. `buttons` is copied verbatim
//! from the TurnLog's `buttons_shown` — the log is the ground truth for
//! what the user saw, and the response must match it token for token.

use serde::{Deserialize, Serialize};

use mesa_core::contract::{Button, InputMode, contract_for};
use mesa_core::stage::Stage;
use mesa_core::turn::{TransitionReason, TurnLog, Violation};

/// Client-side rendering hints derived from the stage contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub stage_type: InputMode,
    pub allow_text: bool,
    pub allow_buttons: bool,
    pub max_buttons: usize,
}

impl ViewModel {
    pub fn for_stage(stage: Stage) -> Self {
        let contract = contract_for(stage);
        Self {
            stage_type: contract.input_mode,
            allow_text: contract.input_mode.allows_text(),
            allow_buttons: contract.input_mode.allows_button(),
            max_buttons: contract.max_buttons,
        }
    }
}

/// Optional diagnostics block, enabled by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub stage_before: Stage,
    pub stage_after: Stage,
    pub reason: TransitionReason,
    pub violations: Vec<Violation>,
}

/// One turn's answer to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    /// True when the event was accepted and handled; false for rejected,
    /// malformed, or faulted turns.
    pub ok: bool,
    pub session_id: String,
    pub stage: Stage,
    pub reply: String,
    pub buttons: Vec<Button>,
    pub view_model: ViewModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl TurnResponse {
    /// Builds the response from the already-finalized turn log.
    pub fn from_turn(turn: &TurnLog, include_debug: bool) -> Self {
        Self {
            ok: turn.accepted(),
            session_id: turn.session_key.clone(),
            stage: turn.stage_after,
            reply: turn.reply.clone(),
            buttons: turn.buttons_shown.clone(),
            view_model: ViewModel::for_stage(turn.stage_after),
            debug: include_debug.then(|| DebugInfo {
                stage_before: turn.stage_before,
                stage_after: turn.stage_after,
                reason: turn.reason,
                violations: turn.violations.clone(),
            }),
        }
    }
}
