//! Commit history resolution over the forge's linear commit listings.
//!
//! The forge has no graph-walk endpoint: a ref's history is whatever the
//! paginated `commits` listing returns, newest first, and that order is
//! trusted as-is.

use std::future::Future;

use tracing::{debug, instrument, warn};

use crate::config::HistoryConfig;
use crate::errors::ForgeError;
use crate::forge::ForgeApi;
use crate::models::Commit;

/// Lists commits of a ref and picks single commits out of those listings.
#[derive(Clone)]
pub struct CommitHistory {
    api: ForgeApi,
    config: HistoryConfig,
}

impl CommitHistory {
    pub fn new(api: ForgeApi, config: HistoryConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &ForgeApi {
        &self.api
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Commits reachable from `reference`, newest first.
    ///
    /// `limit > 0` issues a single request capped at `limit`. `limit == 0`
    /// sends no limit at all and reads pages until an empty one comes back
    /// or `max_pages` pages have been read; a listing cut at the page limit
    /// is returned as read, with a warning.
    #[instrument(skip(self))]
    pub async fn list_commits(
        &self,
        reference: &str,
        limit: u32,
    ) -> Result<Vec<Commit>, ForgeError> {
        if limit > 0 {
            return self.api.commits_page(reference, None, Some(limit)).await;
        }
        Ok(self.full_history(reference).await?.items)
    }

    /// Every page of `reference`'s history, flagged when the page limit
    /// cut it short.
    #[instrument(skip(self))]
    pub async fn full_history(&self, reference: &str) -> Result<Listing<Commit>, ForgeError> {
        let api = &self.api;
        let listing = collect_pages(self.config.max_pages, "commits", move |page| {
            api.commits_page(reference, Some(page), None)
        })
        .await?;
        debug!(
            count = listing.items.len(),
            truncated = listing.truncated,
            "listed full history"
        );
        Ok(listing)
    }

    /// The tip commit of `reference`.
    #[instrument(skip(self))]
    pub async fn newest_commit(&self, reference: &str) -> Result<Commit, ForgeError> {
        self.list_commits(reference, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::NotFound(format!("commits of '{reference}'")))
    }

    /// The last commit of the full listing of `reference`.
    ///
    /// Fails with [`ForgeError::Truncated`] when the listing does not reach
    /// the start of history within `max_pages` pages.
    #[instrument(skip(self))]
    pub async fn oldest_commit(&self, reference: &str) -> Result<Commit, ForgeError> {
        let listing = self.full_history(reference).await?;
        if listing.truncated {
            return Err(self.truncated(reference));
        }
        listing
            .items
            .into_iter()
            .next_back()
            .ok_or_else(|| ForgeError::NotFound(format!("commits of '{reference}'")))
    }

    pub(crate) fn truncated(&self, reference: &str) -> ForgeError {
        ForgeError::Truncated {
            what: format!("history of '{reference}'"),
            max_pages: self.config.max_pages,
        }
    }

    /// The commit whose hash is exactly `sha`.
    ///
    /// Listing from a hash can return that commit's ancestors too, so the
    /// first page is scanned for an exact match.
    #[instrument(skip(self))]
    pub async fn commit_by_sha(&self, sha: &str) -> Result<Commit, ForgeError> {
        self.api
            .commits_page(sha, None, None)
            .await?
            .into_iter()
            .find(|c| c.sha == sha)
            .ok_or_else(|| ForgeError::NotFound(format!("commit {sha}")))
    }
}

/// Items of a paginated listing, in server order.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    /// More items exist past the page limit.
    pub truncated: bool,
}

/// Concatenate pages `1..=max_pages` from `fetch`, stopping at the first
/// empty page.
///
/// When all `max_pages` pages are non-empty, page `max_pages + 1` is read
/// to tell an exact fit from a cut listing; its items are not kept.
pub(crate) async fn collect_pages<T, F, Fut>(
    max_pages: u32,
    what: &str,
    mut fetch: F,
) -> Result<Listing<T>, ForgeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ForgeError>>,
{
    let mut items = Vec::new();
    for page in 1..=max_pages {
        let batch = fetch(page).await?;
        if batch.is_empty() {
            return Ok(Listing {
                items,
                truncated: false,
            });
        }
        items.extend(batch);
    }
    let truncated = !fetch(max_pages.saturating_add(1)).await?.is_empty();
    if truncated {
        warn!(what, max_pages, items = items.len(), "listing truncated at page limit");
    }
    Ok(Listing { items, truncated })
}
