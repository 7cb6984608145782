//! Turn enforcer.
//!
//! Given the contract table, the current session, and a parsed event,
//! decides accept-and-continue or reject-with-explanation. Enforcement runs
//! strictly before any handler executes; a rejection is answered with the
//! current stage's own default buttons, never a foreign stage's.

use crate::contract::{Button, contract_for};
use crate::event::{EventPayload, UserEvent};
use crate::session::Session;
use crate::turn::{Violation, ViolationCode};

/// A rejection produced by the enforcer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub violation: Violation,
    /// The current stage's default button list. Empty for stages with an
    /// empty allowed-token set — the enforcer never invents buttons.
    pub corrected_buttons: Vec<Button>,
}

/// Enforcement verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enforcement {
    /// Event is legal for the current stage; pass through unchanged.
    Accept,
    /// Event is not permitted; answer with the stage's own defaults.
    Reject(Rejection),
}

/// Validates one event against the current stage's contract.
pub fn enforce(session: &Session, event: &UserEvent) -> Enforcement {
    let contract = contract_for(session.stage);

    let violation = match &event.payload {
        EventPayload::Text { .. } if !contract.input_mode.allows_text() => Some(Violation::warning(
            ViolationCode::TextNotAllowed,
            format!("stage {} accepts buttons only", session.stage),
        )),
        EventPayload::Button { token, .. } if !contract.input_mode.allows_button() => {
            Some(Violation::warning(
                ViolationCode::ButtonNotAllowed,
                format!("stage {} accepts text only (got {token})", session.stage),
            ))
        }
        EventPayload::Button { token, .. } if !contract.allows_token(token) => {
            Some(Violation::warning(
                ViolationCode::UnknownButtonToken,
                format!("token {token} is not allowed in stage {}", session.stage),
            ))
        }
        _ => None,
    };

    match violation {
        Some(violation) => Enforcement::Reject(Rejection {
            violation,
            corrected_buttons: contract.default_button_list(),
        }),
        None => Enforcement::Accept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tokens;
    use crate::stage::Stage;
    use chrono::Utc;

    fn session_in(stage: Stage) -> Session {
        Session::new("sess", Utc::now()).with_stage(stage)
    }

    #[test]
    fn test_button_in_text_only_stage_is_rejected_with_no_buttons() {
        // Scenario: ask_name is text-only with an empty allowed-token set.
        let session = session_in(Stage::AskName);
        let event = UserEvent::button(tokens::SOLVED, "¡Se solucionó!", Utc::now());

        match enforce(&session, &event) {
            Enforcement::Reject(rejection) => {
                assert_eq!(rejection.violation.code, ViolationCode::ButtonNotAllowed);
                assert!(rejection.corrected_buttons.is_empty());
            }
            Enforcement::Accept => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_text_in_button_only_stage_reshows_stage_defaults() {
        // Scenario: ask_language is button-only; "hola" must be rejected and
        // the language buttons re-shown.
        let session = session_in(Stage::AskLanguage);
        let event = UserEvent::text("hola", "hola", Utc::now());

        match enforce(&session, &event) {
            Enforcement::Reject(rejection) => {
                assert_eq!(rejection.violation.code, ViolationCode::TextNotAllowed);
                let shown: Vec<&str> = rejection
                    .corrected_buttons
                    .iter()
                    .map(|b| b.token.as_str())
                    .collect();
                assert_eq!(
                    shown,
                    vec![tokens::LANG_ES_AR, tokens::LANG_ES_ES, tokens::LANG_EN]
                );
            }
            Enforcement::Accept => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_unknown_token_in_button_stage_is_rejected() {
        let session = session_in(Stage::Escalate);
        let event = UserEvent::button(tokens::HELP, "Ayuda", Utc::now());

        match enforce(&session, &event) {
            Enforcement::Reject(rejection) => {
                assert_eq!(rejection.violation.code, ViolationCode::UnknownButtonToken);
                // Corrected buttons belong to escalate, not to the foreign stage.
                let shown: Vec<&str> = rejection
                    .corrected_buttons
                    .iter()
                    .map(|b| b.token.as_str())
                    .collect();
                assert_eq!(shown, vec![tokens::YES, tokens::NO]);
            }
            Enforcement::Accept => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_legal_events_pass_through() {
        let session = session_in(Stage::AskLanguage);
        let event = UserEvent::button(tokens::LANG_EN, "English", Utc::now());
        assert_eq!(enforce(&session, &event), Enforcement::Accept);

        let session = session_in(Stage::AskName);
        let event = UserEvent::text("Roberto", "roberto", Utc::now());
        assert_eq!(enforce(&session, &event), Enforcement::Accept);

        // `either` stages take both kinds.
        let session = session_in(Stage::Closed);
        let event = UserEvent::text("gracias", "gracias", Utc::now());
        assert_eq!(enforce(&session, &event), Enforcement::Accept);
    }
}
