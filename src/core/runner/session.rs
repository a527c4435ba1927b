//! What happens once the conflict list has been worked through.

use serde::Serialize;

use crate::core::traits::OperationKind;

/// State of a resolution session after [`finish`](super::ConflictResolutionEngine::finish).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionCompletion {
    /// Conflicts are still listed.
    Pending { remaining: usize },
    /// Everything is resolved and nothing blocks a commit.
    ReadyToCommit { committed: bool },
    /// Everything is resolved inside a rebase, cherry-pick or patch
    /// application, whose own driver continues from here.
    HandedBack { operation: OperationKind },
    /// The session never had conflicts.
    NothingToDo,
}

/// Next step decided from the repository state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStep {
    /// Ask whether to commit now.
    OfferCommit,
    Done(SessionCompletion),
}

/// Decides how a session ends.
///
/// A merge in progress does not block the commit offer; committing is how a
/// merge concludes.
pub fn evaluate_completion(
    remaining: usize,
    operation: Option<OperationKind>,
    started_with_conflicts: bool,
    offer_commit: bool,
) -> CompletionStep {
    if remaining > 0 {
        return CompletionStep::Done(SessionCompletion::Pending { remaining });
    }
    match operation {
        Some(
            operation @ (OperationKind::Rebase
            | OperationKind::CherryPick
            | OperationKind::PatchApply),
        ) => CompletionStep::Done(SessionCompletion::HandedBack { operation }),
        _ if !started_with_conflicts => CompletionStep::Done(SessionCompletion::NothingToDo),
        _ if offer_commit => CompletionStep::OfferCommit,
        _ => CompletionStep::Done(SessionCompletion::ReadyToCommit { committed: false }),
    }
}

impl SessionCompletion {
    /// True when no conflicts remain.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionCompletion::Pending { .. })
    }
}
