//! Batch manifest files for the `apply` command.
//!
//! ```toml
//! [[operation]]
//! kind = "update"
//! path = "conf/app.xml"
//! content_file = "build/app.xml"   # relative to the manifest
//! sha = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use repoflow_core::models::{FileOperation, OperationKind};

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "operation")]
    operations: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    kind: OperationKind,
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_file: Option<PathBuf>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    from_path: Option<String>,
}

/// Read a manifest and the local files it references.
pub fn load(path: &Path) -> Result<Vec<FileOperation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: Manifest = toml::from_str(&text)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));

    manifest
        .operations
        .into_iter()
        .enumerate()
        .map(|(i, entry)| into_operation(i, entry, root))
        .collect()
}

fn into_operation(index: usize, entry: ManifestEntry, root: &Path) -> Result<FileOperation> {
    let content = match (entry.content, entry.content_file) {
        (Some(_), Some(_)) => {
            bail!("operation {index} ({}): set content or content_file, not both", entry.path)
        }
        (Some(text), None) => Some(text.into_bytes()),
        (None, Some(file)) => {
            let file = root.join(file);
            Some(
                std::fs::read(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
            )
        }
        (None, None) => None,
    };
    if entry.kind != OperationKind::Delete && content.is_none() {
        bail!("operation {index} ({}): {} needs content", entry.path, entry.kind);
    }
    Ok(FileOperation {
        kind: entry.kind,
        path: entry.path,
        content,
        sha: entry.sha,
        from_path: entry.from_path,
    })
}
