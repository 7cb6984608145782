//! Stage transition handlers.
//!
//! One handler per stage, all registered into a fixed `HandlerMap` at
//! startup. Handlers only read and write the session's profile bag and
//! return a new session; the pipeline owns enforcement, sanitization,
//! storage, and logging.

mod contact;
mod device;
mod escalate;
mod language;
mod name;
mod need;
mod problem;
mod terminal;
mod tests_round;

use std::sync::Arc;

use mesa_core::handler::HandlerMap;

pub use contact::{CollectEmailHandler, CollectPhoneHandler};
pub use device::AskDeviceHandler;
pub use escalate::EscalateHandler;
pub use language::AskLanguageHandler;
pub use name::AskNameHandler;
pub use need::AskNeedHandler;
pub use problem::AskProblemHandler;
pub use terminal::{ClosedHandler, TicketCreatedHandler};
pub use tests_round::{AdvancedTestsHandler, BasicTestsHandler};

/// Builds the complete stage → handler registry.
pub fn build_handler_map() -> HandlerMap {
    HandlerMap::new()
        .with(Arc::new(AskLanguageHandler))
        .with(Arc::new(AskNameHandler))
        .with(Arc::new(AskNeedHandler))
        .with(Arc::new(AskProblemHandler))
        .with(Arc::new(AskDeviceHandler))
        .with(Arc::new(BasicTestsHandler))
        .with(Arc::new(AdvancedTestsHandler))
        .with(Arc::new(EscalateHandler))
        .with(Arc::new(CollectEmailHandler))
        .with(Arc::new(CollectPhoneHandler))
        .with(Arc::new(TicketCreatedHandler))
        .with(Arc::new(ClosedHandler))
}
