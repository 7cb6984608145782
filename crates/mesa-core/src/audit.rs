//! Offline flow-audit analysis.
//!
//! Loop and anomaly detection over `FlowLogEntry` records. Both checks are
//! derived purely from the log — no counters stored on the session — so a
//! replayed log produces identical reports.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::turn::FlowLogEntry;

/// Regressions that are legal parts of the flow and must not be flagged.
pub const LEGAL_REGRESSIONS: &[(Stage, Stage)] = &[(Stage::Escalate, Stage::AdvancedTests)];

/// A detected repetition: the session keeps re-entering the same stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub session_key: String,
    pub stage: Stage,
    /// Window size the repetition was observed over.
    pub window: usize,
}

/// Examines the most recent `window` entries for one session. Reports a
/// loop when all of them share the same `stage_before` and that stage is
/// not terminal. Entries must be in arrival order, oldest first.
pub fn detect_loop(entries: &[FlowLogEntry], window: usize) -> Option<LoopReport> {
    if window == 0 || entries.len() < window {
        return None;
    }
    let tail = &entries[entries.len() - window..];
    let stage = tail[0].stage_before;
    if stage.is_terminal() {
        return None;
    }
    if tail.iter().all(|e| e.stage_before == stage) {
        return Some(LoopReport {
            session_key: tail[0].session_key.clone(),
            stage,
            window,
        });
    }
    None
}

/// A transition that moved backward through the flow's topological order
/// without being whitelisted. Reported, never auto-corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub session_key: String,
    pub from: Stage,
    pub to: Stage,
}

/// Flags a `stage_after` ranked strictly below `stage_before`, unless the
/// pair is an explicitly legal regression.
pub fn detect_backward_transition(entry: &FlowLogEntry) -> Option<Anomaly> {
    let from = entry.stage_before;
    let to = entry.stage_after;
    if to.flow_rank() >= from.flow_rank() {
        return None;
    }
    if LEGAL_REGRESSIONS.contains(&(from, to)) {
        return None;
    }
    Some(Anomaly {
        session_key: entry.session_key.clone(),
        from,
        to,
    })
}
