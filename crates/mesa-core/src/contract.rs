//! Stage contract table.
//!
//! One declarative contract per stage: which input kinds are legal, which
//! button tokens are legal, how many buttons may be shown, and which buttons
//! a stage presents by default. Pure data plus pure lookup functions; no
//! side effects. Handlers are dispatched elsewhere so contracts can be
//! tested without invoking any handler.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Wire-level button tokens, verbatim from the client protocol.
pub mod tokens {
    pub const LANG_ES_AR: &str = "BTN_LANG_ES_AR";
    pub const LANG_ES_ES: &str = "BTN_LANG_ES_ES";
    pub const LANG_EN: &str = "BTN_LANG_EN";
    pub const HELP: &str = "BTN_HELP";
    pub const TASK: &str = "BTN_TASK";
    pub const TESTS_DONE: &str = "BTN_TESTS_DONE";
    pub const TESTS_FAIL: &str = "BTN_TESTS_FAIL";
    pub const SOLVED: &str = "BTN_SOLVED";
    pub const YES: &str = "BTN_YES";
    pub const NO: &str = "BTN_NO";
}

/// Which input kinds a stage accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Free text only; any button press is rejected.
    Text,
    /// Buttons only; free text is rejected.
    Button,
    /// Either kind is legal.
    Either,
}

impl InputMode {
    pub fn allows_text(self) -> bool {
        matches!(self, InputMode::Text | InputMode::Either)
    }

    pub fn allows_button(self) -> bool {
        matches!(self, InputMode::Button | InputMode::Either)
    }
}

/// One button as transmitted to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub token: String,
    pub label: String,
    pub order: u8,
}

impl Button {
    pub fn new(token: impl Into<String>, label: impl Into<String>, order: u8) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
            order,
        }
    }
}

/// The declarative rule set governing legal inputs and outputs for one stage.
///
/// Invariant: a stage with an empty `allowed_tokens` set never shows a
/// non-empty button list, no matter what any handler or classifier proposed.
/// `sanitize_outgoing_buttons` enforces this independently of enforcement.
#[derive(Debug)]
pub struct StageContract {
    pub stage: Stage,
    pub input_mode: InputMode,
    pub allowed_tokens: &'static [&'static str],
    pub max_buttons: usize,
    /// Default button list as `(token, label)` pairs, in display order.
    pub defaults: &'static [(&'static str, &'static str)],
}

impl StageContract {
    pub fn allows_token(&self, token: &str) -> bool {
        self.allowed_tokens.contains(&token)
    }

    /// The stage's own default buttons, rendered for transmission.
    /// Empty-token-set stages yield an empty list by construction.
    pub fn default_button_list(&self) -> Vec<Button> {
        self.defaults
            .iter()
            .enumerate()
            .map(|(i, (token, label))| Button::new(*token, *label, i as u8))
            .collect()
    }
}

static ASK_LANGUAGE: StageContract = StageContract {
    stage: Stage::AskLanguage,
    input_mode: InputMode::Button,
    allowed_tokens: &[tokens::LANG_ES_AR, tokens::LANG_ES_ES, tokens::LANG_EN],
    max_buttons: 3,
    defaults: &[
        (tokens::LANG_ES_AR, "Español (Argentina)"),
        (tokens::LANG_ES_ES, "Español (España)"),
        (tokens::LANG_EN, "English"),
    ],
};

static ASK_NAME: StageContract = StageContract {
    stage: Stage::AskName,
    input_mode: InputMode::Text,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

static ASK_NEED: StageContract = StageContract {
    stage: Stage::AskNeed,
    input_mode: InputMode::Button,
    allowed_tokens: &[tokens::HELP, tokens::TASK],
    max_buttons: 2,
    defaults: &[
        (tokens::HELP, "Tengo un problema"),
        (tokens::TASK, "Quiero hacer algo"),
    ],
};

static ASK_PROBLEM: StageContract = StageContract {
    stage: Stage::AskProblem,
    input_mode: InputMode::Text,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

static ASK_DEVICE: StageContract = StageContract {
    stage: Stage::AskDevice,
    input_mode: InputMode::Text,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

static BASIC_TESTS: StageContract = StageContract {
    stage: Stage::BasicTests,
    input_mode: InputMode::Button,
    allowed_tokens: &[tokens::TESTS_DONE, tokens::TESTS_FAIL, tokens::SOLVED],
    max_buttons: 3,
    defaults: &[
        (tokens::TESTS_DONE, "Hice las pruebas, sigue igual"),
        (tokens::TESTS_FAIL, "No pude hacerlas"),
        (tokens::SOLVED, "¡Se solucionó!"),
    ],
};

static ADVANCED_TESTS: StageContract = StageContract {
    stage: Stage::AdvancedTests,
    input_mode: InputMode::Button,
    allowed_tokens: &[tokens::TESTS_DONE, tokens::TESTS_FAIL, tokens::SOLVED],
    max_buttons: 3,
    defaults: &[
        (tokens::TESTS_DONE, "Hice las pruebas, sigue igual"),
        (tokens::TESTS_FAIL, "No pude hacerlas"),
        (tokens::SOLVED, "¡Se solucionó!"),
    ],
};

static ESCALATE: StageContract = StageContract {
    stage: Stage::Escalate,
    input_mode: InputMode::Button,
    allowed_tokens: &[tokens::YES, tokens::NO],
    max_buttons: 2,
    defaults: &[(tokens::YES, "Sí, crear ticket"), (tokens::NO, "No, sigo probando")],
};

static COLLECT_EMAIL: StageContract = StageContract {
    stage: Stage::CollectEmail,
    input_mode: InputMode::Text,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

static COLLECT_PHONE: StageContract = StageContract {
    stage: Stage::CollectPhone,
    input_mode: InputMode::Text,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

static TICKET_CREATED: StageContract = StageContract {
    stage: Stage::TicketCreated,
    input_mode: InputMode::Either,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

static CLOSED: StageContract = StageContract {
    stage: Stage::Closed,
    input_mode: InputMode::Either,
    allowed_tokens: &[],
    max_buttons: 0,
    defaults: &[],
};

/// Total, pure lookup: every stage has exactly one contract.
pub fn contract_for(stage: Stage) -> &'static StageContract {
    match stage {
        Stage::AskLanguage => &ASK_LANGUAGE,
        Stage::AskName => &ASK_NAME,
        Stage::AskNeed => &ASK_NEED,
        Stage::AskProblem => &ASK_PROBLEM,
        Stage::AskDevice => &ASK_DEVICE,
        Stage::BasicTests => &BASIC_TESTS,
        Stage::AdvancedTests => &ADVANCED_TESTS,
        Stage::Escalate => &ESCALATE,
        Stage::CollectEmail => &COLLECT_EMAIL,
        Stage::CollectPhone => &COLLECT_PHONE,
        Stage::TicketCreated => &TICKET_CREATED,
        Stage::Closed => &CLOSED,
    }
}

/// Result of sanitizing a handler's proposed button list against the
/// contract of the stage the buttons will be shown in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOutcome {
    /// The final list, exactly as it must be transmitted and logged.
    pub buttons: Vec<Button>,
    /// Tokens dropped because the contract does not allow them.
    pub dropped_tokens: Vec<String>,
    /// How many allowed buttons were cut by the `max_buttons` cap.
    pub truncated: usize,
}

impl SanitizeOutcome {
    /// True when the proposal was not passed through unchanged.
    pub fn altered(&self) -> bool {
        !self.dropped_tokens.is_empty() || self.truncated > 0
    }
}

/// Second, independent output check applied to whatever a handler proposes,
/// after the handler runs and before logging/transmission.
///
/// Drops any token outside the stage's allowed set, truncates to
/// `max_buttons` (tie-break: truncate-and-log, not reject-all), reassigns
/// display order, and forces an empty list whenever the stage's allowed
/// token set is empty.
pub fn sanitize_outgoing_buttons(stage: Stage, proposed: &[Button]) -> SanitizeOutcome {
    let contract = contract_for(stage);

    if contract.allowed_tokens.is_empty() {
        return SanitizeOutcome {
            buttons: Vec::new(),
            dropped_tokens: proposed.iter().map(|b| b.token.clone()).collect(),
            truncated: 0,
        };
    }

    let mut buttons = Vec::new();
    let mut dropped_tokens = Vec::new();
    let mut truncated = 0;

    for button in proposed {
        if !contract.allows_token(&button.token) {
            dropped_tokens.push(button.token.clone());
            continue;
        }
        if buttons.iter().any(|b: &Button| b.token == button.token) {
            // Duplicate proposals collapse to the first occurrence.
            continue;
        }
        if buttons.len() >= contract.max_buttons {
            truncated += 1;
            continue;
        }
        let order = buttons.len() as u8;
        buttons.push(Button::new(button.token.clone(), button.label.clone(), order));
    }

    SanitizeOutcome {
        buttons,
        dropped_tokens,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_stage_has_a_consistent_contract() {
        for stage in Stage::iter() {
            let contract = contract_for(stage);
            assert_eq!(contract.stage, stage);
            assert!(contract.defaults.len() <= contract.max_buttons);
            // Defaults must be drawn from the stage's own allowed set.
            for (token, _) in contract.defaults {
                assert!(contract.allows_token(token), "{stage}: {token}");
            }
            // Empty allowed set implies no defaults and no button budget.
            if contract.allowed_tokens.is_empty() {
                assert!(contract.defaults.is_empty());
                assert_eq!(contract.max_buttons, 0);
            }
        }
    }

    #[test]
    fn test_text_only_stages_reject_buttons_by_contract() {
        let contract = contract_for(Stage::AskName);
        assert_eq!(contract.input_mode, InputMode::Text);
        assert!(contract.allowed_tokens.is_empty());
        assert!(contract.default_button_list().is_empty());
    }

    #[test]
    fn test_sanitize_passes_legal_proposal_through() {
        let proposed = vec![
            Button::new(tokens::YES, "Sí", 0),
            Button::new(tokens::NO, "No", 1),
        ];
        let outcome = sanitize_outgoing_buttons(Stage::Escalate, &proposed);
        assert!(!outcome.altered());
        assert_eq!(outcome.buttons, proposed);
    }

    #[test]
    fn test_sanitize_drops_foreign_tokens() {
        let proposed = vec![
            Button::new(tokens::YES, "Sí", 0),
            Button::new(tokens::SOLVED, "Listo", 1),
        ];
        let outcome = sanitize_outgoing_buttons(Stage::Escalate, &proposed);
        assert!(outcome.altered());
        assert_eq!(outcome.dropped_tokens, vec![tokens::SOLVED.to_string()]);
        assert_eq!(outcome.buttons.len(), 1);
        assert_eq!(outcome.buttons[0].token, tokens::YES);
    }

    #[test]
    fn test_sanitize_forces_empty_list_for_empty_contract() {
        // The hardest-guaranteed invariant in the system: no handler output
        // can put buttons on a text-only stage.
        let proposed = vec![
            Button::new(tokens::SOLVED, "Listo", 0),
            Button::new(tokens::YES, "Sí", 1),
        ];
        let outcome = sanitize_outgoing_buttons(Stage::AskName, &proposed);
        assert!(outcome.buttons.is_empty());
        assert_eq!(outcome.dropped_tokens.len(), 2);
    }

    #[test]
    fn test_sanitize_truncates_past_max_and_reorders() {
        let proposed = vec![
            Button::new(tokens::NO, "No", 7),
            Button::new(tokens::YES, "Sí", 9),
            Button::new(tokens::YES, "Sí otra vez", 3),
        ];
        let outcome = sanitize_outgoing_buttons(Stage::Escalate, &proposed);
        // Duplicate collapses, both fit under max_buttons = 2.
        assert_eq!(outcome.buttons.len(), 2);
        assert_eq!(outcome.buttons[0].token, tokens::NO);
        assert_eq!(outcome.buttons[0].order, 0);
        assert_eq!(outcome.buttons[1].token, tokens::YES);
        assert_eq!(outcome.buttons[1].order, 1);

        let over = vec![
            Button::new(tokens::TESTS_DONE, "a", 0),
            Button::new(tokens::TESTS_FAIL, "b", 1),
            Button::new(tokens::SOLVED, "c", 2),
            Button::new(tokens::TESTS_DONE, "a", 3),
        ];
        let outcome = sanitize_outgoing_buttons(Stage::BasicTests, &over);
        assert_eq!(outcome.buttons.len(), 3);
        assert_eq!(outcome.truncated, 0); // duplicate collapsed, not truncated
    }
}
