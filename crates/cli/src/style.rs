//! Coloured rendering of `repoflow` results.
//!
//! Colours switch off automatically when stdout is not a terminal, so the
//! plain words (`mergeable`, `conflict`, `[OK]`) stay stable for scripts.

use console::{style, Style};

use repoflow_core::conflict::MergeVerdict;
use repoflow_core::models::{BatchOutcome, Commit};
use repoflow_core::ErrorKind;

/// Status tag for `init` / `validate` checklist lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Ok,
    Warn,
    Fail,
}

pub fn marked(mark: Mark, msg: &str) -> String {
    let tag = match mark {
        Mark::Ok => style("[OK]").green(),
        Mark::Warn => style("[WARN]").yellow(),
        Mark::Fail => style("[FAIL]").red(),
    };
    format!("{tag} {msg}")
}

/// The final line of a failed command, tagged with the error kind when
/// the failure came from the forge.
pub fn failure(kind: Option<ErrorKind>, msg: &str) -> String {
    let prefix = style("error").red().bold();
    match kind {
        Some(kind) => format!("{prefix} [{kind}] {msg}"),
        None => format!("{prefix} {msg}"),
    }
}

pub fn verdict(verdict: MergeVerdict) -> String {
    match verdict {
        MergeVerdict::Mergeable => style(verdict).green().to_string(),
        MergeVerdict::Conflicted => style(verdict).red().bold().to_string(),
    }
}

pub fn range_title(branch: &str) -> String {
    style(format!("Commit range of {branch}")).bold().to_string()
}

/// `label  <sha>  <summary>` with the full hash highlighted.
pub fn commit_line(label: &str, commit: &Commit) -> String {
    let sha = Style::new().yellow().apply_to(&commit.sha);
    format!("{label:<6} {sha}  {}", commit.summary())
}

pub fn batch_outcome(outcome: &BatchOutcome) -> String {
    match outcome {
        BatchOutcome::Committed { sha } => {
            format!("{} {}", style("committed").green(), style(sha).yellow())
        }
        BatchOutcome::Unconfirmed { warning } => format!(
            "{} new commit hash unknown: {warning}",
            style("committed").yellow()
        ),
    }
}
