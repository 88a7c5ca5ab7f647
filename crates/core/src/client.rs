//! One-stop construction of every component from an [`AppConfig`].

use std::sync::Arc;

use crate::batch::BatchCommitter;
use crate::config::AppConfig;
use crate::conflict::ConflictPoller;
use crate::errors::ForgeError;
use crate::forge::{ForgeApi, HttpTransport, Transport};
use crate::history::CommitHistory;
use crate::merge_base::MergeBaseResolver;
use crate::range::BranchRangeResolver;

/// All resolvers for one repository, sharing one transport.
///
/// Components hold no mutable state; clones are cheap and may be used from
/// independent tasks.
#[derive(Clone)]
pub struct RepoClient {
    pub history: CommitHistory,
    pub merge_base: MergeBaseResolver,
    pub ranges: BranchRangeResolver,
    pub conflicts: ConflictPoller,
    pub batches: BatchCommitter,
}

impl RepoClient {
    /// Build over an HTTP transport. The token must already be resolved.
    pub fn from_config(config: &AppConfig) -> Result<Self, ForgeError> {
        let transport = HttpTransport::from_config(&config.server)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        let api = ForgeApi::new(transport);
        let history = CommitHistory::new(api.clone(), config.history.clone());
        let merge_base = MergeBaseResolver::new(history.clone());
        let ranges = BranchRangeResolver::new(merge_base.clone(), config.branches.clone());
        let conflicts = ConflictPoller::new(api.clone(), config.polling.clone());
        let batches = BatchCommitter::new(api, config.identity.clone());
        Self {
            history,
            merge_base,
            ranges,
            conflicts,
            batches,
        }
    }
}
