//! Terminal stages.
//!
//! A finished conversation still answers politely; the session stays put.

use mesa_core::error::Result;
use mesa_core::event::UserEvent;
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::Session;
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;

use crate::messages;

pub struct TicketCreatedHandler;

impl StageHandler for TicketCreatedHandler {
    fn stage(&self) -> Stage {
        Stage::TicketCreated
    }

    fn handle(
        &self,
        session: Session,
        _event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let language = session.profile.language_or_default();
        let reply = messages::ticket_reminder(language, session.profile.ticket_id.as_deref());

        Ok(HandlerOutcome {
            session,
            reply,
            proposed_buttons: Vec::new(),
            reason: TransitionReason::Stayed,
        })
    }
}

pub struct ClosedHandler;

impl StageHandler for ClosedHandler {
    fn stage(&self) -> Stage {
        Stage::Closed
    }

    fn handle(
        &self,
        session: Session,
        _event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let language = session.profile.language_or_default();

        Ok(HandlerOutcome {
            session,
            reply: messages::closed_reminder(language),
            proposed_buttons: Vec::new(),
            reason: TransitionReason::Stayed,
        })
    }
}
