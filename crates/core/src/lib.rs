//! repoflow core library.
//!
//! This crate resolves commit ranges and merge bases across branches of a
//! forge-hosted repository using only its REST listings, polls pull request
//! mergeability until the forge settles it, and submits multi-file batches
//! as single atomic commits.

pub mod batch;
pub mod client;
pub mod config;
pub mod conflict;
pub mod errors;
pub mod forge;
pub mod history;
pub mod merge_base;
pub mod models;
pub mod range;

// Re-exports for convenience.
pub use client::RepoClient;
pub use config::AppConfig;
pub use errors::{CoreError, ErrorKind, ForgeError};
pub use tokio_util::sync::CancellationToken;
