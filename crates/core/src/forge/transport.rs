//! Single-request HTTP transport for the forge's repository API.
//!
//! A [`Transport`] turns one [`ApiRequest`] into one [`ApiResponse`]. It
//! reports every HTTP response, successful or not, as `(status, body)`;
//! only a failure to obtain a response at all is an error. Status checks
//! and decoding belong to [`ForgeApi`](super::ForgeApi).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use tracing::{debug, info, instrument};

use crate::config::ServerConfig;
use crate::errors::ForgeError;

/// One request against the repository API, relative to
/// `{base_url}/api/{version}/repos/{owner}/{repo}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the repository root, e.g. `commits` or `pulls/7`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// `METHOD path?k=v&k=v`, in insertion order. Used in logs and tests.
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}", self.method, self.path);
        for (i, (k, v)) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }
}

/// Status and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a single authenticated request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    repo_url: String,
}

impl HttpTransport {
    /// Build a transport for `repo_url` authenticating with `token`.
    pub fn new(repo_url: impl Into<String>, token: &str) -> Result<Self, ForgeError> {
        let repo_url = repo_url.into().trim_end_matches('/').to_string();

        let mut auth = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|_| ForgeError::InvalidArgument("token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repoflow/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        info!(repo_url = %repo_url, "created HttpTransport");
        Ok(Self { http, repo_url })
    }

    /// Build a transport from resolved server settings.
    pub fn from_config(server: &ServerConfig) -> Result<Self, ForgeError> {
        let token = server.token.as_deref().ok_or_else(|| {
            ForgeError::InvalidArgument(format!(
                "server token not resolved (set {})",
                server.token_env
            ))
        })?;
        Self::new(server.repo_api_url(), token)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(request = %request.describe()))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError> {
        let url = format!("{}/{}", self.repo_url, request.path.trim_start_matches('/'));
        let mut req = self.http.request(request.method, &url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(status, bytes = body.len(), "forge response");
        Ok(ApiResponse { status, body })
    }
}
