use crate::error::{PinError, Result};
use crate::extract::ExtractPolicy;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Settings read from `.github/actions-pinning.yaml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Owners whose actions are never pinned.
    #[serde(default = "default_ignore_authors")]
    pub ignore_authors: Vec<String>,
    /// Version assumed for `uses:` values without `@`.
    #[serde(default = "default_ref")]
    pub default_ref: String,
    /// Query GitHub over SSH instead of HTTPS.
    #[serde(default)]
    pub ssh: bool,
}

fn default_ignore_authors() -> Vec<String> {
    vec!["actions".to_string()]
}

fn default_ref() -> String {
    "main".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_authors: default_ignore_authors(),
            default_ref: default_ref(),
            ssh: false,
        }
    }
}

impl Config {
    /// Load the config that sits next to `workflow_dir`, falling back to
    /// defaults when there is none.
    pub fn load(workflow_dir: &Path) -> Result<Self> {
        let Some(path) = paths::config_path(workflow_dir) else {
            return Ok(Self::default());
        };
        if !path.is_file() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config =
            serde_yaml::from_str(&data).map_err(|source| PinError::Config { path, source })?;
        Ok(cfg)
    }

    pub fn policy(&self) -> ExtractPolicy {
        ExtractPolicy {
            ignore_authors: self.ignore_authors.clone(),
            default_ref: self.default_ref.clone(),
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.default_ref.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "default_ref must not be empty".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for author in &self.ignore_authors {
            if author.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "blank entry in ignore_authors".to_string(),
                });
                continue;
            }
            if author.contains('/') {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "ignore_authors entry '{author}' contains '/'; only the owner part is compared"
                    ),
                });
            }
            if !seen.insert(author.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("duplicate ignore_authors entry '{author}'"),
                });
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workflow_dir(dir: &TempDir) -> std::path::PathBuf {
        let wf = dir.path().join(".github/workflows");
        std::fs::create_dir_all(&wf).unwrap();
        wf
    }

    #[test]
    fn defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(&workflow_dir(&dir)).unwrap();
        assert_eq!(cfg.ignore_authors, vec!["actions"]);
        assert_eq!(cfg.default_ref, "main");
        assert!(!cfg.ssh);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let wf = workflow_dir(&dir);
        std::fs::write(
            dir.path().join(".github/actions-pinning.yaml"),
            "ignore_authors: [actions, github]\nssh: true\n",
        )
        .unwrap();

        let cfg = Config::load(&wf).unwrap();
        assert_eq!(cfg.ignore_authors, vec!["actions", "github"]);
        assert_eq!(cfg.default_ref, "main");
        assert!(cfg.ssh);

        let policy = cfg.policy();
        assert!(policy.is_ignored("github"));
        assert!(!policy.is_ignored("owner"));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let wf = workflow_dir(&dir);
        std::fs::write(
            dir.path().join(".github/actions-pinning.yaml"),
            "ignore_authors: nope: nope\n",
        )
        .unwrap();
        assert!(matches!(Config::load(&wf), Err(PinError::Config { .. })));
    }

    #[test]
    fn validate_valid_config_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_problems() {
        let cfg = Config {
            ignore_authors: vec![
                "actions".to_string(),
                "actions".to_string(),
                "owner/repo".to_string(),
                " ".to_string(),
            ],
            default_ref: String::new(),
            ssh: false,
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("default_ref")));
        assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
        assert!(warnings.iter().any(|w| w.message.contains("'owner/repo'")));
        assert!(warnings.iter().any(|w| w.message.contains("blank")));
    }
}
