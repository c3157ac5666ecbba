use crate::error::{PinError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GITHUB_DIR: &str = ".github";
pub const WORKFLOWS_DIR: &str = "workflows";
pub const CONFIG_FILE: &str = "actions-pinning.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Turn a user supplied path into the workflow directory.
///
/// `repo`, `repo/.github` and `repo/.github/workflows` (with or without a
/// trailing slash) all point at `repo/.github/workflows`.
pub fn workflow_dir(path: &Path) -> PathBuf {
    if path.ends_with(Path::new(GITHUB_DIR).join(WORKFLOWS_DIR)) {
        path.components().collect()
    } else if path.ends_with(GITHUB_DIR) {
        path.join(WORKFLOWS_DIR)
    } else {
        path.join(GITHUB_DIR).join(WORKFLOWS_DIR)
    }
}

/// `.github/actions-pinning.yaml` for a given workflow directory.
pub fn config_path(workflow_dir: &Path) -> Option<PathBuf> {
    workflow_dir.parent().map(|github| github.join(CONFIG_FILE))
}

pub fn is_workflow_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}

/// Regular `.yml`/`.yaml` files directly inside `dir`, sorted by name.
pub fn list_workflow_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir_err = |source| PinError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let path = entry.path();
        if path.is_file() && is_workflow_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
