//! Language selection.

use mesa_core::contract::tokens;
use mesa_core::error::{MesaError, Result};
use mesa_core::event::UserEvent;
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::{Language, Session};
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

pub struct AskLanguageHandler;

impl StageHandler for AskLanguageHandler {
    fn stage(&self) -> Stage {
        Stage::AskLanguage
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        // The enforcer only lets allowed button tokens through here.
        let token = event
            .button_token()
            .ok_or_else(|| MesaError::internal("non-button event reached ask_language"))?;

        let language = match token {
            tokens::LANG_ES_AR => Language::EsAr,
            tokens::LANG_ES_ES => Language::EsEs,
            tokens::LANG_EN => Language::En,
            other => {
                return Err(MesaError::internal(format!(
                    "unexpected language token {other}"
                )));
            }
        };

        let mut profile = session.profile.clone();
        profile.language = Some(language);

        Ok(HandlerOutcome {
            session: session.with_profile(profile).with_stage(Stage::AskName),
            reply: messages::ask_name(language),
            proposed_buttons: Vec::new(),
            reason: TransitionReason::Advanced,
        })
    }
}
