//! Contact collection and ticket creation.
//!
//! Both handlers stay in place on implausible input — an explicit decision
//! with `reason: Stayed`, never an implicit fallback.

use mesa_core::error::{MesaError, Result};
use mesa_core::event::{EventPayload, UserEvent};
use mesa_core::handler::{HandlerOutcome, StageHandler};
use mesa_core::intent::IntentResult;
use mesa_core::session::Session;
use mesa_core::stage::Stage;
use mesa_core::turn::TransitionReason;
use uuid::Uuid;

use crate::messages;

fn text_of<'a>(event: &'a UserEvent, stage: Stage) -> Result<&'a str> {
    match &event.payload {
        EventPayload::Text { raw, .. } => Ok(raw.trim()),
        EventPayload::Button { .. } => Err(MesaError::internal(format!(
            "button event reached {stage}"
        ))),
    }
}

/// Just enough shape-checking to catch obvious mistakes; real validation
/// happens when the ticket system sends a confirmation mail.
fn plausible_email(text: &str) -> bool {
    let Some(at) = text.find('@') else {
        return false;
    };
    let (local, domain) = text.split_at(at);
    !local.is_empty() && domain.len() > 1 && domain[1..].contains('.') && !text.contains(' ')
}

fn plausible_phone(text: &str) -> bool {
    text.chars().filter(|c| c.is_ascii_digit()).count() >= 6
}

pub struct CollectEmailHandler;

impl StageHandler for CollectEmailHandler {
    fn stage(&self) -> Stage {
        Stage::CollectEmail
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let text = text_of(event, Stage::CollectEmail)?;
        let language = session.profile.language_or_default();

        if !plausible_email(text) {
            return Ok(HandlerOutcome {
                session,
                reply: messages::email_retry(language),
                proposed_buttons: Vec::new(),
                reason: TransitionReason::Stayed,
            });
        }

        let mut profile = session.profile.clone();
        profile.contact_email = Some(text.to_string());

        Ok(HandlerOutcome {
            session: session.with_profile(profile).with_stage(Stage::CollectPhone),
            reply: messages::ask_phone(language),
            proposed_buttons: Vec::new(),
            reason: TransitionReason::Advanced,
        })
    }
}

pub struct CollectPhoneHandler;

impl StageHandler for CollectPhoneHandler {
    fn stage(&self) -> Stage {
        Stage::CollectPhone
    }

    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        _intent: &IntentResult,
    ) -> Result<HandlerOutcome> {
        let text = text_of(event, Stage::CollectPhone)?;
        let language = session.profile.language_or_default();

        if !plausible_phone(text) {
            return Ok(HandlerOutcome {
                session,
                reply: messages::phone_retry(language),
                proposed_buttons: Vec::new(),
                reason: TransitionReason::Stayed,
            });
        }

        let mut profile = session.profile.clone();
        profile.contact_phone = Some(text.to_string());

        let ticket_id = format!("TCK-{}", &Uuid::new_v4().simple().to_string()[..8]);
        profile.ticket_id = Some(ticket_id.clone());

        Ok(HandlerOutcome {
            session: session
                .with_profile(profile)
                .with_stage(Stage::TicketCreated),
            reply: messages::ticket_created(language, &ticket_id),
            proposed_buttons: Vec::new(),
            reason: TransitionReason::Advanced,
        })
    }
}
