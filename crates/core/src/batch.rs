//! Atomic multi-file commits through the forge's change-files endpoint.
//!
//! A batch is validated locally, then submitted as exactly one request; the
//! forge applies every operation in one new commit or none of them. There
//! is no chunking and no retry here.

use tracing::{info, instrument, warn};

use crate::config::IdentityConfig;
use crate::errors::ForgeError;
use crate::forge::api::{parse_commit_sha, ChangeFilesRequest, WireFileOperation, WireIdentity};
use crate::forge::ForgeApi;
use crate::models::{BatchOutcome, FileOperation};

/// Submits batches of [`FileOperation`]s as single commits.
#[derive(Clone)]
pub struct BatchCommitter {
    api: ForgeApi,
    identity: IdentityConfig,
}

impl BatchCommitter {
    pub fn new(api: ForgeApi, identity: IdentityConfig) -> Self {
        Self { api, identity }
    }

    /// Commit `operations` onto the existing `branch`.
    #[instrument(skip(self, operations), fields(count = operations.len()))]
    pub async fn apply_batch(
        &self,
        operations: &[FileOperation],
        branch: &str,
        message: &str,
    ) -> Result<BatchOutcome, ForgeError> {
        validate_operations(operations)?;
        require_name("branch", branch)?;
        let request = self.build_request(operations, branch, None, message);
        self.submit(&request).await
    }

    /// Create `new_branch` from `base_branch` with `operations` as its
    /// first commit, in one request.
    #[instrument(skip(self, operations), fields(count = operations.len()))]
    pub async fn apply_batch_with_new_branch(
        &self,
        operations: &[FileOperation],
        base_branch: &str,
        new_branch: &str,
        message: &str,
    ) -> Result<BatchOutcome, ForgeError> {
        validate_operations(operations)?;
        require_name("base branch", base_branch)?;
        require_name("new branch", new_branch)?;
        let request = self.build_request(operations, base_branch, Some(new_branch), message);
        self.submit(&request).await
    }

    /// Wire body for a batch, operations kept in order.
    pub fn build_request(
        &self,
        operations: &[FileOperation],
        branch: &str,
        new_branch: Option<&str>,
        message: &str,
    ) -> ChangeFilesRequest {
        let author = WireIdentity {
            name: self.identity.author_name.clone(),
            email: self.identity.author_email.clone(),
        };
        let committer = WireIdentity {
            name: self
                .identity
                .committer_name
                .clone()
                .unwrap_or_else(|| author.name.clone()),
            email: self
                .identity
                .committer_email
                .clone()
                .unwrap_or_else(|| author.email.clone()),
        };
        ChangeFilesRequest {
            branch: branch.to_string(),
            new_branch: new_branch.map(str::to_string),
            author,
            committer,
            message: message.to_string(),
            files: operations.iter().map(WireFileOperation::from).collect(),
        }
    }

    async fn submit(&self, request: &ChangeFilesRequest) -> Result<BatchOutcome, ForgeError> {
        let resp = self.api.change_files(request).await?;
        // The commit exists once the status is 2xx; a bad body only loses
        // the hash.
        match parse_commit_sha(&resp.body) {
            Ok(sha) => {
                info!(sha = %sha, branch = %request.branch, "batch committed");
                Ok(BatchOutcome::Committed { sha })
            }
            Err(e) => {
                warn!(error = %e, status = resp.status, "batch committed but response unreadable");
                Ok(BatchOutcome::Unconfirmed {
                    warning: e.to_string(),
                })
            }
        }
    }
}

fn validate_operations(operations: &[FileOperation]) -> Result<(), ForgeError> {
    if operations.is_empty() {
        return Err(ForgeError::InvalidArgument(
            "batch must contain at least one operation".into(),
        ));
    }
    if let Some(i) = operations.iter().position(|op| op.path.is_empty()) {
        return Err(ForgeError::InvalidArgument(format!(
            "operation {i} has an empty path"
        )));
    }
    Ok(())
}

fn require_name(what: &str, value: &str) -> Result<(), ForgeError> {
    if value.is_empty() {
        return Err(ForgeError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}
