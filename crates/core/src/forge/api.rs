//! Typed wrappers over the repository endpoints the resolvers consume.
//!
//! Each method issues exactly one request through the injected
//! [`Transport`], rejects non-2xx statuses with [`ForgeError::Api`] and
//! decodes the JSON body into domain types.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::errors::ForgeError;
use crate::models::{
    Commit, CompareResult, FileOperation, MergeState, MergeStatus, OperationKind, Signature, Tag,
};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireCommit {
    sha: String,
    #[serde(default)]
    commit: WireCommitDetail,
}

#[derive(Debug, Default, Deserialize)]
struct WireCommitDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    author: WireActor,
    #[serde(default)]
    committer: WireActor,
}

#[derive(Debug, Default, Deserialize)]
struct WireActor {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    date: Option<DateTime<FixedOffset>>,
}

impl From<WireActor> for Signature {
    fn from(a: WireActor) -> Self {
        Signature {
            name: a.name,
            email: a.email,
            date: a.date,
        }
    }
}

impl From<WireCommit> for Commit {
    fn from(c: WireCommit) -> Self {
        Commit {
            sha: c.sha,
            author: c.commit.author.into(),
            committer: c.commit.committer.into(),
            message: c.commit.message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct WireTag {
    name: String,
    commit: WireSha,
}

#[derive(Debug, Deserialize)]
struct WireCompare {
    #[serde(default)]
    merge_base_commit: Option<WireCommit>,
    #[serde(default)]
    commits: Vec<WireCommit>,
}

#[derive(Debug, Deserialize)]
struct WirePull {
    number: u64,
    #[serde(default)]
    mergeable: bool,
    #[serde(default)]
    mergeable_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChangeFilesResponse {
    commit: WireSha,
}

/// Name and email as sent in a change-files request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireIdentity {
    pub name: String,
    pub email: String,
}

/// One entry of the `files` array of a change-files request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFileOperation {
    pub operation: OperationKind,
    pub path: String,
    /// Base64-encoded content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_path: Option<String>,
}

impl From<&FileOperation> for WireFileOperation {
    fn from(op: &FileOperation) -> Self {
        WireFileOperation {
            operation: op.kind,
            path: op.path.clone(),
            content: op.content.as_ref().map(|c| BASE64.encode(c)),
            sha: op.sha.clone(),
            from_path: op.from_path.clone(),
        }
    }
}

/// Body of `POST contents`: all file operations land in one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilesRequest {
    /// Target branch, or the branch to fork from when `new_branch` is set.
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_branch: Option<String>,
    pub author: WireIdentity,
    pub committer: WireIdentity,
    pub message: String,
    pub files: Vec<WireFileOperation>,
}

// ---------------------------------------------------------------------------
// ForgeApi
// ---------------------------------------------------------------------------

/// Endpoint-level client shared by every resolver.
#[derive(Clone)]
pub struct ForgeApi {
    transport: Arc<dyn Transport>,
}

impl ForgeApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `GET commits?sha={reference}[&page=N][&limit=N]`, newest first.
    #[instrument(skip(self))]
    pub async fn commits_page(
        &self,
        reference: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<Commit>, ForgeError> {
        let mut req = ApiRequest::get("commits").with_query("sha", reference);
        if let Some(page) = page {
            req = req.with_query("page", page);
        }
        if let Some(limit) = limit {
            req = req.with_query("limit", limit);
        }
        let commits: Vec<WireCommit> = self.get_json(req, "commit list").await?;
        debug!(count = commits.len(), "fetched commits");
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    /// `GET tags?page=N`.
    #[instrument(skip(self))]
    pub async fn tags_page(&self, page: u32) -> Result<Vec<Tag>, ForgeError> {
        let req = ApiRequest::get("tags").with_query("page", page);
        let tags: Vec<WireTag> = self.get_json(req, "tag list").await?;
        debug!(count = tags.len(), "fetched tags");
        Ok(tags
            .into_iter()
            .map(|t| Tag {
                name: t.name,
                commit_sha: t.commit.sha,
            })
            .collect())
    }

    /// `GET compare/{base}...{head}`, both refs percent-encoded.
    #[instrument(skip(self))]
    pub async fn compare(&self, base: &str, head: &str) -> Result<CompareResult, ForgeError> {
        let req = ApiRequest::get(format!(
            "compare/{}...{}",
            encode_ref(base),
            encode_ref(head)
        ));
        let cmp: WireCompare = self.get_json(req, "compare result").await?;
        debug!(
            has_merge_base = cmp.merge_base_commit.is_some(),
            commits = cmp.commits.len(),
            "fetched compare result"
        );
        Ok(CompareResult {
            merge_base: cmp.merge_base_commit.map(Commit::from),
            commits: cmp.commits.into_iter().map(Commit::from).collect(),
        })
    }

    /// `GET pulls/{number}`, reduced to its mergeability fields.
    #[instrument(skip(self))]
    pub async fn merge_status(&self, number: u64) -> Result<MergeStatus, ForgeError> {
        let req = ApiRequest::get(format!("pulls/{number}"));
        let pr: WirePull = self.get_json(req, "pull request").await?;
        let state = MergeState::from_str_val(pr.mergeable_state.as_deref().unwrap_or(""));
        debug!(number = pr.number, state = %state, mergeable = pr.mergeable, "fetched merge status");
        Ok(MergeStatus {
            number: pr.number,
            mergeable: pr.mergeable,
            state,
        })
    }

    /// `POST contents`. Returns the raw response once the status shows the
    /// server applied the change.
    #[instrument(skip(self, body), fields(branch = %body.branch, files = body.files.len()))]
    pub async fn change_files(&self, body: &ChangeFilesRequest) -> Result<ApiResponse, ForgeError> {
        let value = serde_json::to_value(body).map_err(|source| ForgeError::Decode {
            what: "change-files request".into(),
            source,
        })?;
        let resp = self.transport.send(ApiRequest::post("contents", value)).await?;
        check_status(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        what: &str,
    ) -> Result<T, ForgeError> {
        let resp = check_status(self.transport.send(request).await?)?;
        decode(&resp.body, what)
    }
}

/// Percent-encode a ref name for a URL path, keeping its `/` separators.
fn encode_ref(name: &str) -> String {
    name.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn check_status(resp: ApiResponse) -> Result<ApiResponse, ForgeError> {
    if resp.is_success() {
        Ok(resp)
    } else {
        Err(ForgeError::Api {
            status: resp.status,
            body: resp.body,
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, ForgeError> {
    serde_json::from_str(body).map_err(|source| ForgeError::Decode {
        what: what.to_string(),
        source,
    })
}

/// Extract `commit.sha` from a change-files response body.
pub fn parse_commit_sha(body: &str) -> Result<String, ForgeError> {
    let resp: WireChangeFilesResponse = decode(body, "change-files response")?;
    Ok(resp.commit.sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::forge::transport::fake::{commit_json, FakeTransport};

    fn api_with(fake: &Arc<FakeTransport>) -> ForgeApi {
        ForgeApi::new(fake.clone())
    }

    #[tokio::test]
    async fn test_commits_page_decodes_commits() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "GET commits?sha=main&limit=1",
            serde_json::json!([commit_json("aaa")]),
        );
        let commits = api_with(&fake)
            .commits_page("main", None, Some(1))
            .await
            .unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, "aaa");
        assert_eq!(commits[0].author.email, "dev@example.com");
        assert!(commits[0].committer.date.is_some());
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond("GET pulls/3", 500, "boom");
        let err = api_with(&fake).merge_status(3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond("GET tags?page=1", 200, "{not json");
        let err = api_with(&fake).tags_page(1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_merge_status_null_state_is_unknown() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "GET pulls/9",
            serde_json::json!({"number": 9, "mergeable": true, "mergeable_state": null}),
        );
        let status = api_with(&fake).merge_status(9).await.unwrap();
        assert_eq!(status.state, MergeState::Unknown(String::new()));
        assert!(status.mergeable);
    }

    #[tokio::test]
    async fn test_compare_without_merge_base() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "GET compare/main...feature",
            serde_json::json!({"merge_base_commit": null, "commits": [commit_json("f1")]}),
        );
        let cmp = api_with(&fake).compare("main", "feature").await.unwrap();
        assert!(cmp.merge_base.is_none());
        assert_eq!(cmp.commits.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_escapes_ref_names() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "GET compare/main...fix%2312%25done",
            serde_json::json!({"merge_base_commit": commit_json("m1"), "commits": []}),
        );
        let cmp = api_with(&fake).compare("main", "fix#12%done").await.unwrap();
        assert_eq!(cmp.merge_base.unwrap().sha, "m1");

        assert_eq!(encode_ref("feature/big change"), "feature/big%20change");
        assert_eq!(encode_ref("release-1.0"), "release-1.0");
    }

    #[test]
    fn test_wire_operation_encodes_content() {
        let wire = WireFileOperation::from(&FileOperation::create("a.txt", "hi"));
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["operation"], "create");
        assert_eq!(json["content"], "aGk=");
        assert!(json.get("sha").is_none());
        assert!(json.get("from_path").is_none());
    }

    #[test]
    fn test_parse_commit_sha() {
        assert_eq!(
            parse_commit_sha(r#"{"commit": {"sha": "c0ffee"}}"#).unwrap(),
            "c0ffee"
        );
        assert!(parse_commit_sha("<html>").is_err());
    }
}
