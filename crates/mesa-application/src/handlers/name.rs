//! Name collection.

use mesa_core::error::{MesaError, Result};
use mesa_core::event::{EventPayload, UserEvent};
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::{Intent, IntentResult};
use mesa_core::session::Session;
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

const MAX_NAME_CHARS: usize = 60;

pub struct AskNameHandler;

impl StageHandler for AskNameHandler {
    fn stage(&self) -> Stage {
        Stage::AskName
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
                return Err(MesaError::internal("button event reached ask_name"));
            }
        };

        let mut profile = session.profile.clone();
        // An explicit skip leaves the name unset; anything else is taken
        // verbatim (the classifier is only consulted for the skip signal).
        if intent.intent() != Some(Intent::SkipName) {
            let name: String = raw.trim().chars().take(MAX_NAME_CHARS).collect();
            profile.display_name = Some(name);
        }

        let language = profile.language_or_default();
        let reply = messages::ask_need(language, profile.display_name.as_deref());

        Ok(HandlerOutcome {
            session: session.with_profile(profile).with_stage(Stage::AskNeed),
            reply,
            proposed_buttons: messages::need_buttons(language),
            reason: TransitionReason::Advanced,
        })
    }
}
