//! Classification of observed pull request merge states.

use crate::models::{MergeState, MergeStatus};

/// Terminal answer of a mergeability poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeVerdict {
    Mergeable,
    Conflicted,
}

impl MergeVerdict {
    pub fn is_conflicted(self) -> bool {
        matches!(self, Self::Conflicted)
    }
}

impl std::fmt::Display for MergeVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mergeable => write!(f, "mergeable"),
            Self::Conflicted => write!(f, "conflict"),
        }
    }
}

/// Where one observation leaves the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// The server is still computing; poll again.
    Checking,
    Resolved(MergeVerdict),
}

/// Map an observed status onto the poll state machine.
///
/// `success`, `unstable` and `has_hooks` are mergeable; `conflict`,
/// `behind` and `blocked` are conflicted. Any other state string defers to
/// the boolean `mergeable` flag.
pub fn classify(status: &MergeStatus) -> PollState {
    match &status.state {
        MergeState::Checking => PollState::Checking,
        MergeState::Success | MergeState::Unstable | MergeState::HasHooks => {
            PollState::Resolved(MergeVerdict::Mergeable)
        }
        MergeState::Conflict | MergeState::Behind | MergeState::Blocked => {
            PollState::Resolved(MergeVerdict::Conflicted)
        }
        MergeState::Unknown(_) if status.mergeable => PollState::Resolved(MergeVerdict::Mergeable),
        MergeState::Unknown(_) => PollState::Resolved(MergeVerdict::Conflicted),
    }
}
