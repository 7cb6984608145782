//! Conversation stages.
//!
//! The stage set is a closed enum: a session can never reference a stage
//! without a contract, and handlers can never return one.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// A named state in the conversation's finite state machine.
///
/// The declaration order is also the topological order of the normal
/// triage flow, used by the backward-transition audit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Pick a reply language.
    AskLanguage,
    /// Ask for the user's name (free text only).
    AskName,
    /// Help with a problem, or help with a task?
    AskNeed,
    /// Describe the problem or task.
    AskProblem,
    /// Which device is involved.
    AskDevice,
    /// First round of self-service diagnostic steps.
    BasicTests,
    /// Deeper self-service steps, offered when the user declines a ticket.
    AdvancedTests,
    /// Offer to hand off to a human specialist.
    Escalate,
    /// Collect a contact email for the ticket.
    CollectEmail,
    /// Collect a contact phone for the ticket.
    CollectPhone,
    /// Ticket created; conversation complete.
    TicketCreated,
    /// Solved without a ticket; conversation complete.
    Closed,
}

impl Stage {
    /// The stage every new session starts in.
    pub const fn initial() -> Self {
        Stage::AskLanguage
    }

    /// Terminal stages end the flow; loop detection ignores them.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::TicketCreated | Stage::Closed)
    }

    /// Rank in the forward triage order. A transition to a lower rank is a
    /// regression unless explicitly whitelisted (see `audit`).
    pub const fn flow_rank(self) -> u8 {
        match self {
            Stage::AskLanguage => 0,
            Stage::AskName => 1,
            Stage::AskNeed => 2,
            Stage::AskProblem => 3,
            Stage::AskDevice => 4,
            Stage::BasicTests => 5,
            Stage::AdvancedTests => 6,
            Stage::Escalate => 7,
            Stage::CollectEmail => 8,
            Stage::CollectPhone => 9,
            Stage::TicketCreated => 10,
            Stage::Closed => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_initial_stage() {
        assert_eq!(Stage::initial(), Stage::AskLanguage);
        assert!(!Stage::initial().is_terminal());
    }

    #[test]
    fn test_terminal_stages() {
        let terminal: Vec<Stage> = Stage::iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![Stage::TicketCreated, Stage::Closed]);
    }

    #[test]
    fn test_flow_ranks_are_unique() {
        let mut ranks: Vec<u8> = Stage::iter().map(Stage::flow_rank).collect();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), Stage::iter().count());
    }

    #[test]
    fn test_serde_names_are_snake_case() {
        let json = serde_json::to_string(&Stage::AskLanguage).unwrap();
        assert_eq!(json, "\"ask_language\"");
        assert_eq!(Stage::AskName.to_string(), "ask_name");
    }
}
