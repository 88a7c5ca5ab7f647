//! Domain model types shared by the resolvers, the poller and the batch
//! committer.
//!
//! Everything here is a read-only projection of server state fetched per
//! call; nothing is cached between calls.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// Who authored or committed a change, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub date: Option<DateTime<FixedOffset>>,
}

/// A commit as returned by the forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full content hash.
    pub sha: String,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    /// First seven characters of the hash.
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// First and last commit of a branch's range.
///
/// `first` is an ancestor of, or equal to, `last` as far as the forge's
/// linear commit listings can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRange {
    pub first: Commit,
    pub last: Commit,
}

/// Output of a branch-to-branch compare request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompareResult {
    /// Frequently absent; callers must be prepared to synthesize one.
    pub merge_base: Option<Commit>,
    pub commits: Vec<Commit>,
}

/// A repository tag and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub commit_sha: String,
}

// ---------------------------------------------------------------------------
// Pull request mergeability
// ---------------------------------------------------------------------------

/// Server-computed mergeability of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeState {
    Checking,
    Success,
    Conflict,
    Behind,
    Blocked,
    Unstable,
    HasHooks,
    /// Empty or unrecognised state string, kept verbatim.
    Unknown(String),
}

impl MergeState {
    /// Parse the `mergeable_state` wire string.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "checking" => Self::Checking,
            "success" => Self::Success,
            "conflict" => Self::Conflict,
            "behind" => Self::Behind,
            "blocked" => Self::Blocked,
            "unstable" => Self::Unstable,
            "has_hooks" => Self::HasHooks,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for MergeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checking => write!(f, "checking"),
            Self::Success => write!(f, "success"),
            Self::Conflict => write!(f, "conflict"),
            Self::Behind => write!(f, "behind"),
            Self::Blocked => write!(f, "blocked"),
            Self::Unstable => write!(f, "unstable"),
            Self::HasHooks => write!(f, "has_hooks"),
            Self::Unknown(s) if s.is_empty() => write!(f, "unknown"),
            Self::Unknown(s) => write!(f, "unknown({s})"),
        }
    }
}

/// One observation of a pull request's mergeability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStatus {
    pub number: u64,
    /// Fallback flag consulted only when `state` is unknown.
    pub mergeable: bool,
    pub state: MergeState,
}

// ---------------------------------------------------------------------------
// Batch file operations
// ---------------------------------------------------------------------------

/// Kind of a single file mutation in a batch commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One file mutation within a batch commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    pub kind: OperationKind,
    pub path: String,
    /// Raw file content; encoded for the wire by the committer.
    #[serde(default)]
    pub content: Option<Vec<u8>>,
    /// Blob hash the server must still see at `path` (optimistic
    /// concurrency token for update and delete).
    #[serde(default)]
    pub sha: Option<String>,
    /// Previous path when an update renames the file.
    #[serde(default)]
    pub from_path: Option<String>,
}

impl FileOperation {
    pub fn create(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OperationKind::Create,
            path: path.into(),
            content: Some(content.into()),
            sha: None,
            from_path: None,
        }
    }

    pub fn update(
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        sha: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::Update,
            path: path.into(),
            content: Some(content.into()),
            sha: Some(sha.into()),
            from_path: None,
        }
    }

    pub fn delete(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            path: path.into(),
            content: None,
            sha: Some(sha.into()),
            from_path: None,
        }
    }

    /// Turn an update into a rename from `from`.
    pub fn renamed_from(mut self, from: impl Into<String>) -> Self {
        self.from_path = Some(from.into());
        self
    }
}

/// Result of a submitted batch commit.
///
/// The server applied the batch in both cases; `Unconfirmed` means the
/// response could not be read back, so the new commit hash is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Committed { sha: String },
    Unconfirmed { warning: String },
}

impl BatchOutcome {
    /// The new commit hash, or `""` when unconfirmed.
    pub fn commit_sha(&self) -> &str {
        match self {
            Self::Committed { sha } => sha,
            Self::Unconfirmed { .. } => "",
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Committed { .. } => None,
            Self::Unconfirmed { warning } => Some(warning),
        }
    }
}
