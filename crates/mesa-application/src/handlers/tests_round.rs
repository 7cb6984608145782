//! Self-service test rounds (basic and advanced).
//!
//! Both rounds share the same outcome semantics: solved closes the
//! conversation, anything else moves to the escalation offer with the
//! result recorded.

use mesa_core::contract::tokens;
use mesa_core::error::{MesaError, Result};
use mesa_core::event::UserEvent;
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::{Session, TestsOutcome};
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

fn handle_tests_round(stage: Stage, session: Session, event: &UserEvent) -> Result<HandlerOutcome> {
    let token = event
        .button_token()
        .ok_or_else(|| MesaError::internal(format!("non-button event reached {stage}")))?;

    let mut profile = session.profile.clone();
    let language = profile.language_or_default();

    match token {
        tokens::SOLVED => {
            profile.tests = Some(TestsOutcome::Solved);
            Ok(HandlerOutcome {
                session: session.with_profile(profile).with_stage(Stage::Closed),
                reply: messages::closed_thanks(language),
                proposed_buttons: Vec::new(),
                reason: TransitionReason::Advanced,
            })
        }
        tokens::TESTS_DONE | tokens::TESTS_FAIL => {
            profile.tests = Some(if token == tokens::TESTS_DONE {
                TestsOutcome::StillBroken
            } else {
                TestsOutcome::NotRun
            });
            Ok(HandlerOutcome {
                session: session.with_profile(profile).with_stage(Stage::Escalate),
                reply: messages::escalate_offer(language),
                proposed_buttons: messages::escalate_buttons(language),
                reason: TransitionReason::Advanced,
            })
        }
        other => Err(MesaError::internal(format!(
            "unexpected tests token {other} in {stage}"
        ))),
    }
}

pub struct BasicTestsHandler;

impl StageHandler for BasicTestsHandler {
    fn stage(&self) -> Stage {
        Stage::BasicTests
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        handle_tests_round(Stage::BasicTests, session, event)
    }
}

pub struct AdvancedTestsHandler;

impl StageHandler for AdvancedTestsHandler {
    fn stage(&self) -> Stage {
        Stage::AdvancedTests
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        handle_tests_round(Stage::AdvancedTests, session, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(stage: Stage) -> Session {
        Session::new("s", Utc::now()).with_stage(stage)
    }

    #[test]
    fn test_solved_closes_the_conversation() {
        let event = UserEvent::button(tokens::SOLVED, "¡Se solucionó!", Utc::now());
        let outcome = BasicTestsHandler
            .handle(session(Stage::BasicTests), &event, &IntentResult::Skipped)
            .unwrap();

        assert_eq!(outcome.session.stage, Stage::Closed);
        assert_eq!(outcome.session.profile.tests, Some(TestsOutcome::Solved));
        assert!(outcome.proposed_buttons.is_empty());
    }

    #[test]
    fn test_still_broken_offers_escalation() {
        let event = UserEvent::button(tokens::TESTS_DONE, "Sigue igual", Utc::now());
        let outcome = BasicTestsHandler
            .handle(session(Stage::BasicTests), &event, &IntentResult::Skipped)
            .unwrap();

        assert_eq!(outcome.session.stage, Stage::Escalate);
        assert_eq!(
            outcome.session.profile.tests,
            Some(TestsOutcome::StillBroken)
        );
        assert_eq!(outcome.proposed_buttons.len(), 2);
    }

    #[test]
    fn test_advanced_round_has_same_semantics() {
        let event = UserEvent::button(tokens::TESTS_FAIL, "No pude", Utc::now());
        let outcome = AdvancedTestsHandler
            .handle(session(Stage::AdvancedTests), &event, &IntentResult::Skipped)
            .unwrap();

        assert_eq!(outcome.session.stage, Stage::Escalate);
        assert_eq!(outcome.session.profile.tests, Some(TestsOutcome::NotRun));
    }
}
