//! Escalation offer.
//!
//! Declining the ticket moves the session back to `advanced_tests` — the
//! one whitelisted regression in the flow's topological order.

use mesa_core::contract::tokens;
use mesa_core::error::{MesaError, Result};
use mesa_core::event::UserEvent;
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::Session;
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

pub struct EscalateHandler;

impl StageHandler for EscalateHandler {
    fn stage(&self) -> Stage {
        Stage::Escalate
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let token = event
            .button_token()
            .ok_or_else(|| MesaError::internal("non-button event reached escalate"))?;

        let language = session.profile.language_or_default();

        match token {
            tokens::YES => Ok(HandlerOutcome {
                session: session.with_stage(Stage::CollectEmail),
                reply: messages::ask_email(language),
                proposed_buttons: Vec::new(),
                reason: TransitionReason::Advanced,
            }),
            tokens::NO => Ok(HandlerOutcome {
                session: session.with_stage(Stage::AdvancedTests),
                reply: messages::advanced_tests(language),
                proposed_buttons: messages::tests_buttons(language),
                reason: TransitionReason::Advanced,
            }),
            other => Err(MesaError::internal(format!(
                "unexpected escalate token {other}"
            ))),
        }
    }
}
