//! TOML-based configuration for repoflow.
//!
//! The API token is stored as a `token_env` field naming an environment
//! variable; the actual secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`]. Every retry, backoff and paging limit
//! lives here so components never embed their own constants.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Forge server and repository coordinates.
    pub server: ServerConfig,

    /// Trunk / base branch policy.
    #[serde(default)]
    pub branches: BranchConfig,

    /// Mergeability polling policy.
    #[serde(default)]
    pub polling: PollConfig,

    /// Commit history paging limits.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Author / committer used for batch commits.
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Forge API location and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server root URL (e.g. `https://git.example.com`).
    pub base_url: String,

    /// API version segment of the path template.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Environment variable holding the API token.
    pub token_env: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_api_version() -> String {
    "v1".into()
}

impl ServerConfig {
    /// `{base_url}/api/{version}/repos/{owner}/{repo}` without a trailing slash.
    pub fn repo_api_url(&self) -> String {
        format!(
            "{}/api/{}/repos/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            self.owner,
            self.repo
        )
    }
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

/// Branch naming policy used by the range resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Branch names treated as trunk (exact match).
    #[serde(default = "default_trunk")]
    pub trunk: Vec<String>,

    /// Branch used as merge-base target when nothing else is configured.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Preferred merge-base target for feature branches.
    #[serde(default)]
    pub base_branch: Option<String>,

    /// Tag marking the first commit of trunk's range.
    #[serde(default = "default_start_tag")]
    pub start_tag: String,
}

fn default_trunk() -> Vec<String> {
    vec!["main".into(), "master".into()]
}
fn default_branch() -> String {
    "main".into()
}
fn default_start_tag() -> String {
    "sq-start".into()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            trunk: default_trunk(),
            default_branch: default_branch(),
            base_branch: None,
            start_tag: default_start_tag(),
        }
    }
}

impl BranchConfig {
    pub fn is_trunk(&self, branch: &str) -> bool {
        self.trunk.iter().any(|t| t == branch)
    }

    /// Merge-base target for a feature branch: the caller's choice, then the
    /// configured base branch, then the default branch.
    pub fn base_for<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|b| !b.is_empty())
            .or_else(|| self.base_branch.as_deref().filter(|b| !b.is_empty()))
            .unwrap_or(self.default_branch.as_str())
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Mergeability polling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds to wait between polls while the server is still checking.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Total number of polls before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    60
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Limits on unbounded history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of pages read for an unlimited listing.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Author and committer identity for batch commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Defaults to the author when unset.
    #[serde(default)]
    pub committer_name: Option<String>,

    /// Defaults to the author when unset.
    #[serde(default)]
    pub committer_email: Option<String>,
}

fn default_author_name() -> String {
    "repoflow".into()
}
fn default_author_email() -> String {
    "repoflow@localhost".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
            committer_name: None,
            committer_email: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the API token from the environment.
    ///
    /// The token is required for every forge call, so a missing variable is
    /// an error rather than a warning.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        let env_name = &self.server.token_env;
        match std::env::var(env_name) {
            Ok(val) if !val.is_empty() => {
                debug!(env_name = %env_name, "resolved server token");
                self.server.token = Some(val);
                Ok(())
            }
            Ok(_) | Err(_) => {
                warn!(env_name = %env_name, "server token env var not set or empty");
                Err(ConfigError::EnvVarMissing {
                    var: env_name.clone(),
                    field: "server.token_env".into(),
                })
            }
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.server.base_url.trim();
        if base.is_empty() {
            return Err(invalid("server.base_url", "base URL must not be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid(
                "server.base_url",
                "base URL must start with http:// or https://",
            ));
        }
        if self.server.owner.is_empty() {
            return Err(invalid("server.owner", "owner must not be empty"));
        }
        if self.server.repo.is_empty() {
            return Err(invalid("server.repo", "repo must not be empty"));
        }
        if self.branches.trunk.is_empty() {
            return Err(invalid("branches.trunk", "at least one trunk branch is required"));
        }
        if self.branches.default_branch.is_empty() {
            return Err(invalid("branches.default_branch", "must not be empty"));
        }
        if self.polling.max_attempts == 0 {
            return Err(invalid("polling.max_attempts", "must be > 0"));
        }
        if self.history.max_pages == 0 {
            return Err(invalid("history.max_pages", "must be > 0"));
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
log_level = "debug"

[server]
base_url = "https://git.example.com/"
api_version = "v1"
owner = "acme"
repo = "configs"
token_env = "REPOFLOW_TOKEN"

[branches]
trunk = ["master"]
default_branch = "master"
base_branch = "develop"
start_tag = "sq-start"

[polling]
interval_secs = 2
max_attempts = 10

[history]
max_pages = 20

[identity]
author_name = "CI Bot"
author_email = "ci@example.com"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.server.owner, "acme");
        assert_eq!(config.branches.trunk, vec!["master"]);
        assert_eq!(config.branches.base_branch.as_deref(), Some("develop"));
        assert_eq!(config.polling.interval(), Duration::from_secs(2));
        assert_eq!(config.history.max_pages, 20);
        assert_eq!(
            config.server.repo_api_url(),
            "https://git.example.com/api/v1/repos/acme/configs"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[server]
base_url = "https://git.example.com"
owner = "acme"
repo = "configs"
token_env = "TOKEN"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.api_version, "v1");
        assert_eq!(config.branches.trunk, vec!["main", "master"]);
        assert_eq!(config.branches.start_tag, "sq-start");
        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.polling.max_attempts, 60);
        assert_eq!(config.history.max_pages, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.server.base_url = "git.example.com".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "server.base_url"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.polling.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "polling.max_attempts"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("REPOFLOW_TEST_TOKEN_OK", "t0ken");
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.server.token_env = "REPOFLOW_TEST_TOKEN_OK".into();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.server.token.as_deref(), Some("t0ken"));
        std::env::remove_var("REPOFLOW_TEST_TOKEN_OK");

        config.server.token_env = "REPOFLOW_TEST_TOKEN_UNSET".into();
        assert!(matches!(
            config.resolve_env_vars(),
            Err(ConfigError::EnvVarMissing { .. })
        ));
    }

    #[test]
    fn test_base_for_precedence() {
        let mut branches = BranchConfig::default();
        assert_eq!(branches.base_for(None), "main");
        assert_eq!(branches.base_for(Some("")), "main");

        branches.base_branch = Some("develop".into());
        assert_eq!(branches.base_for(None), "develop");
        assert_eq!(branches.base_for(Some("release")), "release");
        assert!(branches.is_trunk("master"));
        assert!(!branches.is_trunk("main2"));
    }
}
