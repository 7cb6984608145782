//! Problem vs. task selection.

use mesa_core::contract::tokens;
use mesa_core::error::{MesaError, Result};
use mesa_core::event::UserEvent;
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::{Need, Session};
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

pub struct AskNeedHandler;

impl StageHandler for AskNeedHandler {
    fn stage(&self) -> Stage {
        Stage::AskNeed
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let token = event
            .button_token()
            .ok_or_else(|| MesaError::internal("non-button event reached ask_need"))?;

        let need = match token {
            tokens::HELP => Need::Help,
            tokens::TASK => Need::Task,
            other => {
                return Err(MesaError::internal(format!("unexpected need token {other}")));
            }
        };

        let mut profile = session.profile.clone();
        profile.need = Some(need);
        let language = profile.language_or_default();

        Ok(HandlerOutcome {
            session: session.with_profile(profile).with_stage(Stage::AskProblem),
            reply: messages::ask_problem(language, need),
            proposed_buttons: Vec::new(),
            reason: TransitionReason::Advanced,
        })
    }
}
