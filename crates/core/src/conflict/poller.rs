//! Bounded, cancellable polling of a pull request's mergeability.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::state::{classify, MergeVerdict, PollState};
use crate::config::PollConfig;
use crate::errors::ForgeError;
use crate::forge::ForgeApi;

/// Observes a pull request until the forge settles its mergeability.
///
/// Only the `checking` state is retried. Any HTTP failure ends the poll
/// immediately.
#[derive(Clone)]
pub struct ConflictPoller {
    api: ForgeApi,
    config: PollConfig,
}

impl ConflictPoller {
    pub fn new(api: ForgeApi, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Whether pull request `number` cannot be merged cleanly.
    pub async fn has_conflict(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<bool, ForgeError> {
        Ok(self.wait_for_verdict(number, cancel).await?.is_conflicted())
    }

    /// Poll until a terminal state, at most `max_attempts` reads spaced
    /// `interval_secs` apart.
    ///
    /// Cancelling `cancel` aborts both an in-flight read and the wait
    /// between reads with [`ForgeError::Cancelled`].
    #[instrument(skip(self, cancel))]
    pub async fn wait_for_verdict(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<MergeVerdict, ForgeError> {
        let max_attempts = self.config.max_attempts;
        let interval = self.config.interval();

        for attempt in 1..=max_attempts {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ForgeError::Cancelled { number }),
                status = self.api.merge_status(number) => status?,
            };

            match classify(&status) {
                PollState::Resolved(verdict) => {
                    info!(attempt, state = %status.state, %verdict, "mergeability resolved");
                    return Ok(verdict);
                }
                PollState::Checking => {
                    debug!(attempt, max_attempts, "mergeability still checking");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ForgeError::Cancelled { number }),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        warn!(max_attempts, "mergeability still checking, giving up");
        Err(ForgeError::Timeout {
            number,
            attempts: max_attempts,
        })
    }
}
