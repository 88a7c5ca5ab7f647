//! Merge-base resolution between two branches.
//!
//! The forge's compare endpoint is asked first. It often omits the merge
//! base (long or rewritten histories), in which case a
//! [`MergeBaseStrategy`] approximates one from linear commit listings.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::errors::ForgeError;
use crate::history::CommitHistory;
use crate::models::Commit;

/// Approximates a merge base when the forge does not supply one.
#[async_trait]
pub trait MergeBaseStrategy: Send + Sync {
    async fn approximate(
        &self,
        history: &CommitHistory,
        base: &str,
        head: &str,
    ) -> Result<Commit, ForgeError>;
}

/// Single-parent approximation: find `head`'s oldest commit in `base`'s
/// listing and report the commit just before it.
///
/// Not merge-aware. Histories where `head` does not share its root with
/// `base` fall back to the tip of `base`. A base listing cut at the page
/// limit yields [`ForgeError::Truncated`] unless the head root is found
/// with an older commit after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanStrategy;

#[async_trait]
impl MergeBaseStrategy for LinearScanStrategy {
    async fn approximate(
        &self,
        history: &CommitHistory,
        base: &str,
        head: &str,
    ) -> Result<Commit, ForgeError> {
        let head_root = history.oldest_commit(head).await?;
        let base_history = history.full_history(base).await?;
        // On a cut listing only a hit with an older commit after it is
        // conclusive.
        if base_history.truncated
            && !base_history
                .items
                .iter()
                .rev()
                .skip(1)
                .any(|c| c.sha == head_root.sha)
        {
            return Err(history.truncated(base));
        }
        linear_scan(base, &head_root, &base_history.items)
    }
}

/// Locate `head_root` in `base_commits` (newest first) and return the
/// element after it.
///
/// - found before the end: the next-older commit of `base`;
/// - found at the end: [`ForgeError::NoPriorCommit`];
/// - absent: the newest commit of `base`.
pub fn linear_scan(
    base: &str,
    head_root: &Commit,
    base_commits: &[Commit],
) -> Result<Commit, ForgeError> {
    match base_commits.iter().position(|c| c.sha == head_root.sha) {
        Some(i) if i + 1 < base_commits.len() => {
            debug!(index = i, "head root found in base history");
            Ok(base_commits[i + 1].clone())
        }
        Some(_) => Err(ForgeError::NoPriorCommit {
            base: base.to_string(),
            sha: head_root.sha.clone(),
        }),
        None => {
            warn!(
                base,
                head_root = %head_root.sha,
                "head root not in base history, using base tip as merge base"
            );
            base_commits
                .first()
                .cloned()
                .ok_or_else(|| ForgeError::NotFound(format!("commits of '{base}'")))
        }
    }
}

/// Resolves the common ancestor of two branches.
#[derive(Clone)]
pub struct MergeBaseResolver {
    history: CommitHistory,
    strategy: Arc<dyn MergeBaseStrategy>,
}

impl MergeBaseResolver {
    /// Resolver using [`LinearScanStrategy`] as the fallback.
    pub fn new(history: CommitHistory) -> Self {
        Self::with_strategy(history, Arc::new(LinearScanStrategy))
    }

    pub fn with_strategy(history: CommitHistory, strategy: Arc<dyn MergeBaseStrategy>) -> Self {
        Self { history, strategy }
    }

    pub fn history(&self) -> &CommitHistory {
        &self.history
    }

    /// Merge base of `head` onto `base`.
    ///
    /// A compare response carrying a merge base is returned verbatim. A
    /// response without one, or a 404 from a forge lacking the compare
    /// endpoint, triggers the fallback strategy. Other failures propagate.
    #[instrument(skip(self))]
    pub async fn merge_base(&self, base: &str, head: &str) -> Result<Commit, ForgeError> {
        match self.history.api().compare(base, head).await {
            Ok(cmp) => match cmp.merge_base {
                Some(commit) => {
                    debug!(sha = %commit.sha, "merge base supplied by compare");
                    return Ok(commit);
                }
                None => info!("compare omitted merge base, approximating"),
            },
            Err(ForgeError::Api { status: 404, .. }) => {
                warn!("compare endpoint unavailable, approximating merge base");
            }
            Err(e) => return Err(e),
        }
        self.strategy.approximate(&self.history, base, head).await
    }
}
