//! Error types for the repoflow core library.
//!
//! Forge interactions share a single [`ForgeError`] whose [`ErrorKind`] is
//! the machine-readable classification surfaced to callers. Configuration
//! loading has its own [`ConfigError`], and [`CoreError`] unifies both.

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Forge errors
// ---------------------------------------------------------------------------

/// Machine-distinguishable classification of a [`ForgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NoPriorCommit,
    Timeout,
    Cancelled,
    Upstream,
    InvalidArgument,
    Decode,
    Truncated,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NoPriorCommit => "no_prior_commit",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Upstream => "upstream",
            Self::InvalidArgument => "invalid_argument",
            Self::Decode => "decode",
            Self::Truncated => "truncated",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from forge API interactions and the resolvers built on them.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// An empty result where exactly one commit or tag was expected.
    #[error("{0} not found")]
    NotFound(String),

    /// The merge-base scan reached the first commit of the base branch.
    #[error("no commit precedes {sha} on branch '{base}'")]
    NoPriorCommit { base: String, sha: String },

    /// The mergeability poll ran out of attempts while still checking.
    #[error("pull request #{number} still checking after {attempts} attempts")]
    Timeout { number: u64, attempts: u32 },

    /// The caller cancelled a mergeability poll in progress.
    #[error("polling of pull request #{number} was cancelled")]
    Cancelled { number: u64 },

    /// HTTP-level transport error (connect, TLS, body read).
    #[error("forge HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("forge API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// A lower-layer failure re-reported by a composite operation.
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        source: Box<ForgeError>,
    },

    /// Caller input rejected before any request was issued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A full listing hit the page limit, so its end is unknown.
    #[error("{what} continues past {max_pages} pages (raise history.max_pages)")]
    Truncated { what: String, max_pages: u32 },

    /// The response body was not the JSON shape we expected.
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        source: serde_json::Error,
    },
}

impl ForgeError {
    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoPriorCommit { .. } => ErrorKind::NoPriorCommit,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Transport(_) | Self::Api { .. } | Self::Upstream { .. } => ErrorKind::Upstream,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Truncated { .. } => ErrorKind::Truncated,
        }
    }

    /// The HTTP status carried by this error or any error it wraps.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Upstream { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The innermost error, skipping any `Upstream` wrappers.
    pub fn root(&self) -> &ForgeError {
        match self {
            Self::Upstream { source, .. } => source.root(),
            other => other,
        }
    }

    /// Re-report this error as an upstream failure of `context`.
    ///
    /// Transport and API errors are already upstream failures and pass
    /// through unchanged.
    pub fn into_upstream(self, context: impl Into<String>) -> ForgeError {
        match self {
            e @ (Self::Transport(_) | Self::Api { .. }) => e,
            other => Self::Upstream {
                context: context.into(),
                source: Box::new(other),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
