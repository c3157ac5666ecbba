use pinning_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the workflow directory to scan.
///
/// The explicit path (or the current directory when none is given) is
/// mapped onto its `.github/workflows` directory.
pub fn resolve_workflow_dir(explicit: Option<&Path>) -> PathBuf {
    let base = match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    paths::workflow_dir(&base)
}
