//! repoflow command-line tool.
//!
//! Resolves commit ranges and merge bases, waits on pull request
//! mergeability and submits batch commits against a forge repository
//! described by a TOML configuration file.

mod manifest;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use repoflow_core::{AppConfig, CancellationToken, ErrorKind, ForgeError, RepoClient};

use style::Mark;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Branch, pull request and batch commit automation for forge repositories.
#[derive(Parser, Debug)]
#[command(name = "repoflow", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./repoflow.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// List commits of a branch, tag or hash, newest first.
    Commits {
        reference: String,

        /// Maximum number of commits (0 = whole history).
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show the first and last commit of a branch's range.
    Range {
        branch: String,

        /// Merge-base target for feature branches (defaults to config).
        #[arg(long)]
        base: Option<String>,
    },

    /// Show the merge base of HEAD onto BASE.
    MergeBase { base: String, head: String },

    /// Wait for a pull request's mergeability and report it.
    Conflict {
        /// Pull request number.
        number: u64,

        /// Give up after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Exit with status 1 when the pull request has conflicts.
        #[arg(long)]
        fail_on_conflict: bool,
    },

    /// Commit a manifest of file operations in one atomic commit.
    Apply {
        /// TOML manifest with `[[operation]]` entries.
        manifest: PathBuf,

        /// Branch to commit onto (or to fork from with --new-branch).
        #[arg(short, long)]
        branch: String,

        /// Create this branch from --branch with the commit.
        #[arg(long)]
        new_branch: Option<String>,

        /// Commit message.
        #[arg(short, long)]
        message: String,
    },
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("repoflow")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let kind = e
                .chain()
                .find_map(|c| c.downcast_ref::<ForgeError>())
                .map(ForgeError::kind);
            eprintln!("{}", style::failure(kind, &format!("{e:#}")));
            ExitCode::from(exit_status(kind))
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = match cli.verbose {
        0 => AppConfig::load_from_file(&cli.config)
            .map(|c| c.log_level)
            .unwrap_or_else(|_| "warn".into()),
        1 => "info".into(),
        _ => "debug".into(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Distinct exit status per failure kind so scripts can branch on it.
fn exit_status(kind: Option<ErrorKind>) -> u8 {
    match kind {
        None => 1,
        Some(ErrorKind::InvalidArgument) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::NoPriorCommit) => 4,
        Some(ErrorKind::Timeout) => 5,
        Some(ErrorKind::Upstream) => 6,
        Some(ErrorKind::Decode) => 7,
        Some(ErrorKind::Truncated) => 8,
        Some(ErrorKind::Cancelled) => 130,
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output).map(|_| ExitCode::SUCCESS),
        Commands::Validate => cmd_validate(&cli.config).map(|_| ExitCode::SUCCESS),
        command => {
            let config = load_config(&cli.config)?;
            let client = RepoClient::from_config(&config).context("failed to build forge client")?;

            let result = match command {
                Commands::Commits { reference, limit } => cmd_commits(&client, &reference, limit).await,
                Commands::Range { branch, base } => cmd_range(&client, &branch, base.as_deref()).await,
                Commands::MergeBase { base, head } => cmd_merge_base(&client, &base, &head).await,
                Commands::Conflict {
                    number,
                    timeout,
                    fail_on_conflict,
                } => cmd_conflict(&client, number, timeout, fail_on_conflict).await,
                Commands::Apply {
                    manifest,
                    branch,
                    new_branch,
                    message,
                } => cmd_apply(&client, &manifest, &branch, new_branch.as_deref(), &message).await,
                Commands::Init { .. } | Commands::Validate => unreachable!(),
            };
            result.map(|_| ExitCode::SUCCESS).or_else(|e| match e.downcast_ref::<ConflictFound>() {
                Some(_) => Ok(ExitCode::FAILURE),
                None => Err(e),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

/// Raised by `conflict --fail-on-conflict`; turned into exit status 1.
#[derive(Debug)]
struct ConflictFound;

impl std::fmt::Display for ConflictFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pull request has conflicts")
    }
}

impl std::error::Error for ConflictFound {}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# repoflow configuration

log_level = "warn"

[server]
base_url = "https://git.example.com"
api_version = "v1"
owner = "acme"
repo = "configs"
token_env = "REPOFLOW_TOKEN"

[branches]
trunk = ["main", "master"]
default_branch = "main"
# base_branch = "develop"
start_tag = "sq-start"

[polling]
interval_secs = 5
max_attempts = 60

[history]
max_pages = 100

[identity]
author_name = "CI Bot"
author_email = "ci@example.com"
# committer_name = "CI Bot"
# committer_email = "ci@example.com"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(output, default_config).context("failed to write config file")?;

    println!(
        "{}",
        style::marked(Mark::Ok, &format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your server and repository details");
    println!("  2. Export the token variable named by server.token_env");
    println!("  3. Validate with: repoflow validate --config {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::marked(Mark::Ok, "TOML structure is valid"));

    let token_ok = match config.resolve_env_vars() {
        Ok(()) => {
            println!(
                "  {}",
                style::marked(Mark::Ok, &format!("Token resolved from {}", config.server.token_env))
            );
            true
        }
        Err(e) => {
            println!("  {}", style::marked(Mark::Warn, &e.to_string()));
            false
        }
    };

    if let Err(e) = config.validate() {
        println!("  {}", style::marked(Mark::Fail, &format!("Validation error: {e}")));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::marked(Mark::Ok, "All required fields are valid"));

    println!();
    println!("Configuration summary:");
    println!("  Repository API : {}", config.server.repo_api_url());
    println!("  Token          : {}", if token_ok { "set" } else { "NOT SET" });
    println!("  Trunk branches : {}", config.branches.trunk.join(", "));
    println!(
        "  Base branch    : {}",
        config.branches.base_for(None)
    );
    println!("  Start tag      : {}", config.branches.start_tag);
    println!(
        "  Polling        : every {}s, {} attempts",
        config.polling.interval_secs, config.polling.max_attempts
    );
    println!("  History pages  : {}", config.history.max_pages);

    if !token_ok {
        anyhow::bail!("token is not available");
    }
    println!();
    println!("Configuration is valid.");
    Ok(())
}

async fn cmd_commits(client: &RepoClient, reference: &str, limit: u32) -> Result<()> {
    let commits = client
        .history
        .list_commits(reference, limit)
        .await
        .with_context(|| format!("failed to list commits of '{reference}'"))?;

    if commits.is_empty() {
        println!("No commits found.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Commit", "Author", "Date", "Summary"]);
    for c in &commits {
        table.add_row(vec![
            c.short_sha().to_string(),
            c.author.name.clone(),
            c.author
                .date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            c.summary().to_string(),
        ]);
    }
    println!("{table}");
    println!("{} commit(s)", commits.len());
    Ok(())
}

async fn cmd_range(client: &RepoClient, branch: &str, base: Option<&str>) -> Result<()> {
    let range = client
        .ranges
        .commit_range_with_base(branch, base)
        .await
        .with_context(|| format!("failed to resolve commit range of '{branch}'"))?;
    println!("{}", style::range_title(branch));
    println!("{}", style::commit_line("first", &range.first));
    println!("{}", style::commit_line("last", &range.last));
    Ok(())
}

async fn cmd_merge_base(client: &RepoClient, base: &str, head: &str) -> Result<()> {
    let commit = client
        .merge_base
        .merge_base(base, head)
        .await
        .with_context(|| format!("failed to resolve merge base of '{head}' onto '{base}'"))?;
    println!("{}", style::commit_line("base", &commit));
    Ok(())
}

async fn cmd_conflict(
    client: &RepoClient,
    number: u64,
    timeout: Option<u64>,
    fail_on_conflict: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received Ctrl+C, cancelling poll");
            on_signal.cancel();
        }
    });
    if let Some(secs) = timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!(secs, "timeout reached, cancelling poll");
            on_timeout.cancel();
        });
    }

    let verdict = client
        .conflicts
        .wait_for_verdict(number, &cancel)
        .await
        .with_context(|| format!("failed to determine mergeability of #{number}"))?;
    cancel.cancel();

    println!("{}", style::verdict(verdict));
    if fail_on_conflict && verdict.is_conflicted() {
        return Err(ConflictFound.into());
    }
    Ok(())
}

async fn cmd_apply(
    client: &RepoClient,
    manifest_path: &Path,
    branch: &str,
    new_branch: Option<&str>,
    message: &str,
) -> Result<()> {
    let operations = manifest::load(manifest_path)?;
    info!(count = operations.len(), "loaded batch manifest");

    let outcome = match new_branch {
        Some(new_branch) => {
            client
                .batches
                .apply_batch_with_new_branch(&operations, branch, new_branch, message)
                .await
        }
        None => client.batches.apply_batch(&operations, branch, message).await,
    }
    .context("failed to apply batch")?;

    println!("{}", style::batch_outcome(&outcome));
    Ok(())
}
