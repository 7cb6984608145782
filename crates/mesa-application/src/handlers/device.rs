//! Device identification.

use mesa_core::error::{MesaError, Result};
use mesa_core::event::{EventPayload, UserEvent};
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::Session;
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

pub struct AskDeviceHandler;

impl StageHandler for AskDeviceHandler {
    fn stage(&self) -> Stage {
        Stage::AskDevice
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let raw = match &event.payload {
            EventPayload::Text { raw, .. } => raw.as_str(),
            EventPayload::Button { .. } => {
                return Err(MesaError::internal("button event reached ask_device"));
            }
        };

        let mut profile = session.profile.clone();
        profile.device = Some(raw.trim().to_string());
        let language = profile.language_or_default();

        Ok(HandlerOutcome {
            session: session.with_profile(profile).with_stage(Stage::BasicTests),
            reply: messages::basic_tests(language),
            proposed_buttons: messages::tests_buttons(language),
            reason: TransitionReason::Advanced,
        })
    }
}
