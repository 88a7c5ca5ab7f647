//! End-to-end tests of the HTTP transport against an in-process forge.
//!
//! An `axum` server on an ephemeral port stands in for the forge's
//! repository API. It records every request and serves histories, tags,
//! pull request states and change-files responses from shared state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use repoflow_core::config::AppConfig;
use repoflow_core::models::FileOperation;
use repoflow_core::{CancellationToken, ErrorKind, RepoClient};

// ===========================================================================
// Test forge
// ===========================================================================

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    query: HashMap<String, String>,
    authorization: Option<String>,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerFile {
    operation: String,
    path: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerChangeFiles {
    branch: String,
    #[serde(default)]
    new_branch: Option<String>,
    message: String,
    files: Vec<ServerFile>,
}

#[derive(Default)]
struct Forge {
    histories: Mutex<HashMap<String, Vec<String>>>,
    tags: Mutex<Vec<(String, String)>>,
    pull_states: Mutex<VecDeque<(String, bool)>>,
    change_files: Mutex<Vec<ServerChangeFiles>>,
    fail_commits: Mutex<Option<u16>>,
    requests: Mutex<Vec<Recorded>>,
}

impl Forge {
    fn record(&self, path: &str, query: &HashMap<String, String>, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            path: path.to_string(),
            query: query.clone(),
            authorization: header("authorization"),
            content_type: header("content-type"),
        });
    }

    fn set_history(&self, reference: &str, shas: &[&str]) {
        self.histories.lock().unwrap().insert(
            reference.to_string(),
            shas.iter().map(|s| s.to_string()).collect(),
        );
    }

    fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

fn commit(sha: &str) -> Value {
    json!({
        "sha": sha,
        "commit": {
            "message": format!("commit {sha}"),
            "author": {"name": "Dev", "email": "dev@example.com", "date": "2024-05-01T08:30:00+02:00"},
            "committer": {"name": "Dev", "email": "dev@example.com", "date": "2024-05-01T08:30:00+02:00"}
        }
    })
}

async fn list_commits(
    State(forge): State<Arc<Forge>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    forge.record("commits", &query, &headers);
    if let Some(status) = *forge.fail_commits.lock().unwrap() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({"message": "failure"})));
    }
    let reference = query.get("sha").cloned().unwrap_or_default();
    let histories = forge.histories.lock().unwrap();
    let Some(history) = histories.get(&reference) else {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "ref not found"})));
    };
    let shas: Vec<&String> = match (query.get("page"), query.get("limit")) {
        (Some(page), _) if page != "1" => Vec::new(),
        (_, Some(limit)) => history.iter().take(limit.parse().unwrap()).collect(),
        _ => history.iter().collect(),
    };
    let body: Vec<Value> = shas.iter().map(|s| commit(s)).collect();
    (StatusCode::OK, Json(Value::Array(body)))
}

async fn list_tags(
    State(forge): State<Arc<Forge>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    forge.record("tags", &query, &headers);
    if query.get("page").map(String::as_str) != Some("1") {
        return Json(json!([]));
    }
    let tags: Vec<Value> = forge
        .tags
        .lock()
        .unwrap()
        .iter()
        .map(|(name, sha)| json!({"name": name, "commit": {"sha": sha}}))
        .collect();
    Json(Value::Array(tags))
}

async fn compare(
    State(forge): State<Arc<Forge>>,
    Path(spec): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    forge.record(&format!("compare/{spec}"), &HashMap::new(), &headers);
    Json(json!({"merge_base_commit": null, "commits": []}))
}

async fn get_pull(
    State(forge): State<Arc<Forge>>,
    Path(number): Path<u64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    forge.record("pulls", &HashMap::new(), &headers);
    let mut states = forge.pull_states.lock().unwrap();
    let (state, mergeable) = if states.len() > 1 {
        states.pop_front().unwrap()
    } else {
        states.front().cloned().unwrap()
    };
    Json(json!({"number": number, "mergeable": mergeable, "mergeable_state": state}))
}

async fn change_files(
    State(forge): State<Arc<Forge>>,
    headers: HeaderMap,
    Json(body): Json<ServerChangeFiles>,
) -> impl IntoResponse {
    forge.record("contents", &HashMap::new(), &headers);
    forge.change_files.lock().unwrap().push(body);
    (StatusCode::CREATED, Json(json!({"commit": {"sha": "c0mm17"}})))
}

async fn start_forge(forge: Arc<Forge>) -> String {
    let repo = Router::new()
        .route("/commits", get(list_commits))
        .route("/tags", get(list_tags))
        .route("/compare/:spec", get(compare))
        .route("/pulls/:number", get(get_pull))
        .route("/contents", post(change_files))
        .with_state(forge);
    let app = Router::new().nest("/api/v1/repos/acme/configs", repo);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config_for(base_url: &str) -> AppConfig {
    let toml_str = format!(
        r#"
[server]
base_url = "{base_url}"
owner = "acme"
repo = "configs"
token_env = "UNUSED_TOKEN_ENV"

[polling]
interval_secs = 0
max_attempts = 5

[identity]
author_name = "CI Bot"
author_email = "ci@example.com"
"#
    );
    let mut config: AppConfig = toml::from_str(&toml_str).unwrap();
    config.server.token = Some("s3cret".into());
    config.validate().unwrap();
    config
}

async fn assert_first_in_history(client: &RepoClient, branch: &str, sha: &str) {
    let history = client.history.list_commits(branch, 0).await.unwrap();
    assert!(
        history.iter().any(|c| c.sha == sha),
        "{sha} is not in the history of {branch}"
    );
}

async fn setup() -> (Arc<Forge>, RepoClient) {
    let forge = Arc::new(Forge::default());
    let url = start_forge(forge.clone()).await;
    let client = RepoClient::from_config(&config_for(&url)).unwrap();
    (forge, client)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_requests_carry_token_and_json_headers() {
    let (forge, client) = setup().await;
    forge.set_history("main", &["c2", "c1"]);

    let tip = client.history.newest_commit("main").await.unwrap();
    assert_eq!(tip.sha, "c2");
    assert!(tip.author.date.is_some());

    let reqs = forge.requests_to("commits");
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].authorization.as_deref(), Some("token s3cret"));
    assert_eq!(reqs[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(reqs[0].query.get("limit").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_unlimited_listing_omits_limit() {
    let (forge, client) = setup().await;
    forge.set_history("main", &["c3", "c2", "c1"]);

    let oldest = client.history.oldest_commit("main").await.unwrap();
    assert_eq!(oldest.sha, "c1");
    let reqs = forge.requests_to("commits");
    assert_eq!(reqs.len(), 2);
    assert!(reqs.iter().all(|r| !r.query.contains_key("limit")));
}

#[tokio::test]
async fn test_trunk_range_starts_at_tag() {
    let (forge, client) = setup().await;
    forge.set_history("main", &["T3", "S", "T1", "ROOT"]);
    forge.set_history("S", &["S", "T1", "ROOT"]);
    forge
        .tags
        .lock()
        .unwrap()
        .push(("sq-start".to_string(), "S".to_string()));

    let range = client.ranges.commit_range("main").await.unwrap();
    assert_eq!(range.first.sha, "S");
    assert_eq!(range.last.sha, "T3");
    assert_first_in_history(&client, "main", &range.first.sha).await;
}

#[tokio::test]
async fn test_trunk_range_without_tag_starts_at_root() {
    let (forge, client) = setup().await;
    forge.set_history("master", &["T3", "T2", "ROOT"]);
    forge
        .tags
        .lock()
        .unwrap()
        .push(("v1.0".to_string(), "T2".to_string()));

    let range = client.ranges.commit_range("master").await.unwrap();
    assert_eq!(range.first.sha, "ROOT");
    assert_eq!(range.last.sha, "T3");
    assert_first_in_history(&client, "master", &range.first.sha).await;
}

#[tokio::test]
async fn test_feature_range_via_linear_scan() {
    let (forge, client) = setup().await;
    forge.set_history("feature", &["H1", "H0"]);
    forge.set_history("main", &["B2", "H0", "B0"]);

    let range = client.ranges.commit_range("feature").await.unwrap();
    assert_eq!(range.first.sha, "B0");
    assert_eq!(range.last.sha, "H1");
    assert_eq!(forge.requests_to("compare/main...feature").len(), 1);
}

#[tokio::test]
async fn test_feature_range_with_url_special_branch_name() {
    let (forge, client) = setup().await;
    forge.set_history("fix#7%", &["H1", "H0"]);
    forge.set_history("main", &["B2", "H0", "B0"]);

    let range = client.ranges.commit_range("fix#7%").await.unwrap();
    assert_eq!(range.first.sha, "B0");
    assert_eq!(range.last.sha, "H1");
    assert_eq!(forge.requests_to("compare/main...fix#7%").len(), 1);
}

#[tokio::test]
async fn test_server_error_surfaces_status() {
    let (forge, client) = setup().await;
    *forge.fail_commits.lock().unwrap() = Some(500);

    let err = client.ranges.commit_range("main").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_conflict_poll_checking_then_success() {
    let (forge, client) = setup().await;
    {
        let mut states = forge.pull_states.lock().unwrap();
        states.push_back(("checking".into(), false));
        states.push_back(("success".into(), false));
    }
    let conflicted = client
        .conflicts
        .has_conflict(12, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!conflicted);
    assert_eq!(forge.requests_to("pulls").len(), 2);
}

#[tokio::test]
async fn test_batch_round_trip_preserves_order() {
    let (forge, client) = setup().await;
    let ops = vec![
        FileOperation::create("conf/new.xml", "<new/>"),
        FileOperation::update("conf/app.xml", "<app/>", "blob1").renamed_from("conf/old.xml"),
        FileOperation::delete("conf/gone.xml", "blob2"),
    ];

    let outcome = client
        .batches
        .apply_batch_with_new_branch(&ops, "main", "feature/load", "Load configuration")
        .await
        .unwrap();
    assert_eq!(outcome.commit_sha(), "c0mm17");

    let received = forge.change_files.lock().unwrap();
    assert_eq!(received.len(), 1);
    let batch = &received[0];
    assert_eq!(batch.branch, "main");
    assert_eq!(batch.new_branch.as_deref(), Some("feature/load"));
    assert_eq!(batch.message, "Load configuration");

    let got: Vec<(&str, &str)> = batch
        .files
        .iter()
        .map(|f| (f.operation.as_str(), f.path.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("create", "conf/new.xml"),
            ("update", "conf/app.xml"),
            ("delete", "conf/gone.xml"),
        ]
    );

    let content = base64::engine::general_purpose::STANDARD
        .decode(batch.files[0].content.as_deref().unwrap())
        .unwrap();
    assert_eq!(content, b"<new/>");
}

#[tokio::test]
async fn test_invalid_batch_never_reaches_server() {
    let (forge, client) = setup().await;
    let err = client
        .batches
        .apply_batch(&[FileOperation::create("", "x")], "main", "msg")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(forge.requests_to("contents").is_empty());
}
