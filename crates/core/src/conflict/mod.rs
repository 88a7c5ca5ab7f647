//! Pull request merge-conflict detection.
//!
//! The forge computes mergeability asynchronously: a pull request reports
//! `checking` until a background job settles on a terminal state. The
//! subsystem is split into:
//! 1. **Classification** -- mapping one observed state to checking / mergeable / conflicted.
//! 2. **Polling** -- re-reading the state on a fixed interval until it is terminal,
//!    the attempt budget runs out, or the caller cancels.

pub mod poller;
pub mod state;

pub use poller::ConflictPoller;
pub use state::{classify, MergeVerdict, PollState};
