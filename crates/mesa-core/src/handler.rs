//! Stage transition handlers.
//!
//! One handler per stage, implementing a single common interface, resolved
//! once at startup into a fixed map. Handlers are pure with respect to the
//! core: no storage or logging calls, no live reference to stored state —
//! they receive an owned session and return a new one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::contract::Button;
use crate::error::{MesaError, Result};
use crate::event::UserEvent;
use crate::intent::IntentResult;
use crate::session::Session;
use crate::stage::Stage;
use crate::turn::TransitionReason;

/// What a handler returns. Staying in place is an explicit decision
/// (`reason: Stayed`), never an implicit fallback.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub session: Session,
    pub reply: String,
    /// Proposal only: the pipeline sanitizes this against the stage-after
    /// contract before anything is logged or transmitted.
    pub proposed_buttons: Vec<Button>,
    pub reason: TransitionReason,
}

/// A per-stage transition function.
pub trait StageHandler: Send + Sync {
    /// The stage this handler owns.
    fn stage(&self) -> Stage;

    /// Processes one accepted event. Errors are handler faults: the turn
    /// is aborted and the session is left unmodified.
    fn handle(
        &self,
        session: Session,
        event: &UserEvent,
        intent: &IntentResult,
    ) -> Result<HandlerOutcome>;
}

/// Fixed stage → handler map, built once at startup.
#[derive(Default)]
pub struct HandlerMap {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own stage. Last registration wins.
    pub fn register(&mut self, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(handler.stage(), handler);
    }

    /// Builder-style registration.
    pub fn with(mut self, handler: Arc<dyn StageHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Resolves the handler for a stage. A missing registration is a
    /// programming error surfaced as `Internal`, not a recoverable case.
    pub fn get(&self, stage: Stage) -> Result<&Arc<dyn StageHandler>> {
        self.handlers
            .get(&stage)
            .ok_or_else(|| MesaError::internal(format!("no handler registered for stage {stage}")))
    }

    /// True when every known stage has a handler. Checked at startup.
    pub fn is_complete(&self) -> bool {
        use strum::IntoEnumIterator;
        Stage::iter().all(|stage| self.handlers.contains_key(&stage))
    }
}
