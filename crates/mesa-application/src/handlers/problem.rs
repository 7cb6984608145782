//! Problem description.

use mesa_core::error::{MesaError, Result};
use mesa_core::event::{EventPayload, UserEvent};
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::Session;
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

pub struct AskProblemHandler;

impl StageHandler for AskProblemHandler {
    fn stage(&self) -> Stage {
        Stage::AskProblem
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let raw = match &event.payload {
            EventPayload::Text { raw, .. } => raw.as_str(),
            EventPayload::Button { .. } => {
                return Err(MesaError::internal("button event reached ask_problem"));
            }
        };

        let mut profile = session.profile.clone();
        profile.problem = Some(raw.trim().to_string());
        let language = profile.language_or_default();

        // A degraded oracle is a defined case here, not an error: the raw
        // description is kept verbatim and the flow continues on the
        // fallback path.
        let reason = if intent.is_degraded() {
            TransitionReason::Degraded
        } else {
            TransitionReason::Advanced
        };

        Ok(HandlerOutcome {
            session: session.with_profile(profile).with_stage(Stage::AskDevice),
            reply: messages::ask_device(language),
            proposed_buttons: Vec::new(),
            reason,
        })
    }
}
