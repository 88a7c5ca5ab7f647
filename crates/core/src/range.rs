//! `(first, last)` commit range of a branch.
//!
//! Trunk branches start at the configured start tag, or at the root of
//! their history when the tag does not exist. Feature branches start at
//! their merge base with the base branch.

use tracing::{debug, info, instrument};

use crate::config::BranchConfig;
use crate::errors::ForgeError;
use crate::history::{collect_pages, CommitHistory};
use crate::merge_base::MergeBaseResolver;
use crate::models::{Commit, CommitRange, Tag};

/// Resolves [`CommitRange`]s with trunk / feature branch policies.
#[derive(Clone)]
pub struct BranchRangeResolver {
    merge_base: MergeBaseResolver,
    branches: BranchConfig,
}

impl BranchRangeResolver {
    pub fn new(merge_base: MergeBaseResolver, branches: BranchConfig) -> Self {
        Self {
            merge_base,
            branches,
        }
    }

    fn history(&self) -> &CommitHistory {
        self.merge_base.history()
    }

    /// Range of `branch` using the configured base branch for feature
    /// branches.
    pub async fn commit_range(&self, branch: &str) -> Result<CommitRange, ForgeError> {
        self.commit_range_with_base(branch, None).await
    }

    /// Range of `branch`; `base` overrides the configured base branch for
    /// feature branches and is ignored for trunk.
    ///
    /// Lower-layer failures are reported as upstream failures of this call.
    #[instrument(skip(self))]
    pub async fn commit_range_with_base(
        &self,
        branch: &str,
        base: Option<&str>,
    ) -> Result<CommitRange, ForgeError> {
        let range = if self.branches.is_trunk(branch) {
            self.trunk_range(branch).await
        } else {
            let base = self.branches.base_for(base);
            self.feature_range(branch, base).await
        };
        let range = range.map_err(|e| e.into_upstream(format!("commit range of '{branch}'")))?;
        info!(
            branch,
            first = %range.first.short_sha(),
            last = %range.last.short_sha(),
            "resolved commit range"
        );
        Ok(range)
    }

    async fn trunk_range(&self, branch: &str) -> Result<CommitRange, ForgeError> {
        let last = self.history().newest_commit(branch).await?;
        let first = self.trunk_start(branch).await?;
        Ok(CommitRange { first, last })
    }

    async fn trunk_start(&self, branch: &str) -> Result<Commit, ForgeError> {
        let tag_name = &self.branches.start_tag;
        match self.find_tag(tag_name).await? {
            Some(tag) => {
                debug!(tag = %tag.name, sha = %tag.commit_sha, "start tag found");
                self.history().commit_by_sha(&tag.commit_sha).await
            }
            None => {
                info!(tag = %tag_name, branch, "start tag absent, using root commit");
                self.history().oldest_commit(branch).await
            }
        }
    }

    async fn feature_range(&self, branch: &str, base: &str) -> Result<CommitRange, ForgeError> {
        let last = self.history().newest_commit(branch).await?;
        let first = self.merge_base.merge_base(base, branch).await?;
        Ok(CommitRange { first, last })
    }

    /// A tag missing from a cut tag listing may still exist, so that case
    /// is an error rather than `None`.
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, ForgeError> {
        let api = self.history().api();
        let max_pages = self.history().config().max_pages;
        let tags = collect_pages(max_pages, "tags", move |page| api.tags_page(page)).await?;
        match tags.items.into_iter().find(|t| t.name == name) {
            Some(tag) => Ok(Some(tag)),
            None if tags.truncated => Err(ForgeError::Truncated {
                what: "tag list".into(),
                max_pages,
            }),
            None => Ok(None),
        }
    }
}
