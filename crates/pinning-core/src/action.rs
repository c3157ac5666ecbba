use serde::Serialize;
use std::fmt;

/// Prefix marking a repository-local action (`uses: ./path/to/action`).
pub const LOCAL_PREFIX: &str = "./";

/// Prefix marking a container image action (`uses: docker://alpine:3`).
pub const DOCKER_PREFIX: &str = "docker://";

/// Length of a full commit SHA. Anything this long is treated as pinned.
pub const COMMIT_SHA_LEN: usize = 40;

// ---------------------------------------------------------------------------
// ActionIdentity
// ---------------------------------------------------------------------------

/// The `owner/repo` pair an action is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ActionIdentity {
    pub owner: String,
    pub repo: String,
}

impl ActionIdentity {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn https_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }

    pub fn ssh_url(&self) -> String {
        format!("git@github.com:{}/{}.git", self.owner, self.repo)
    }
}

impl fmt::Display for ActionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

// ---------------------------------------------------------------------------
// ActionUse
// ---------------------------------------------------------------------------

/// A parsed `uses:` value: `owner/repo[/sub/path][@version]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionUse {
    pub identity: ActionIdentity,
    /// Sub-directory inside the repository, e.g. `init` in `github/codeql-action/init`.
    pub path: Option<String>,
    pub version: String,
}

impl ActionUse {
    /// Parse a `uses:` value. The first `@` separates the version; a missing
    /// version falls back to `default_ref`. Returns `None` when the value is
    /// not shaped like `owner/repo`.
    pub fn parse(raw: &str, default_ref: &str) -> Option<Self> {
        let (name, version) = match raw.split_once('@') {
            Some((name, version)) => (name, version),
            None => (raw, default_ref),
        };

        let mut parts = name.splitn(3, '/');
        let owner = parts.next().filter(|s| !s.is_empty())?;
        let repo = parts.next().filter(|s| !s.is_empty())?;
        let path = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

        Some(Self {
            identity: ActionIdentity::new(owner, repo),
            path,
            version: version.to_string(),
        })
    }

    /// `owner/repo[/path]` without the version.
    pub fn name(&self) -> String {
        match &self.path {
            Some(path) => format!("{}/{}", self.identity, path),
            None => self.identity.to_string(),
        }
    }

    /// The value written back once `commit` is known.
    pub fn pinned_to(&self, commit: &str) -> String {
        format!("{}@{}", self.name(), commit)
    }

    pub fn is_pinned(&self) -> bool {
        is_commit_sha(&self.version)
    }
}

impl fmt::Display for ActionUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name(), self.version)
    }
}

/// Length-only check: no hex validation is performed.
pub fn is_commit_sha(version: &str) -> bool {
    version.chars().count() == COMMIT_SHA_LEN
}

/// The trailing comment attached to a pinned `uses:` value.
pub fn annotation(original: &str) -> String {
    format!("actions-pinning<{original}>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_owner_repo_and_tag() {
        let action = ActionUse::parse("actions/checkout@v4", "main").unwrap();
        assert_eq!(action.identity, ActionIdentity::new("actions", "checkout"));
        assert_eq!(action.path, None);
        assert_eq!(action.version, "v4");
        assert_eq!(action.to_string(), "actions/checkout@v4");
    }

    #[test]
    fn missing_version_uses_default_ref() {
        let action = ActionUse::parse("owner/tool", "main").unwrap();
        assert_eq!(action.version, "main");
    }

    #[test]
    fn splits_on_first_at_sign() {
        let action = ActionUse::parse("owner/tool@release@2", "main").unwrap();
        assert_eq!(action.identity.to_string(), "owner/tool");
        assert_eq!(action.version, "release@2");
    }

    #[test]
    fn sub_path_is_kept_out_of_identity() {
        let action = ActionUse::parse("github/codeql-action/init@v3", "main").unwrap();
        assert_eq!(action.identity.to_string(), "github/codeql-action");
        assert_eq!(action.path.as_deref(), Some("init"));
        assert_eq!(action.name(), "github/codeql-action/init");

        let sha = "a".repeat(40);
        assert_eq!(
            action.pinned_to(&sha),
            format!("github/codeql-action/init@{sha}")
        );
    }

    #[test]
    fn rejects_values_without_owner_and_repo() {
        for raw in ["checkout@v4", "/checkout@v4", "owner/@v1", ""] {
            assert!(ActionUse::parse(raw, "main").is_none(), "expected none: {raw}");
        }
    }

    #[test]
    fn commit_detection_is_length_based() {
        assert!(is_commit_sha(&"1".repeat(40)));
        assert!(is_commit_sha(&"z".repeat(40)));
        assert!(!is_commit_sha(&"a".repeat(39)));
        assert!(!is_commit_sha("v4"));
    }

    #[test]
    fn remote_urls() {
        let id = ActionIdentity::new("owner", "action");
        assert_eq!(id.https_url(), "https://github.com/owner/action.git");
        assert_eq!(id.ssh_url(), "git@github.com:owner/action.git");
    }

    #[test]
    fn annotation_format() {
        assert_eq!(annotation("v4"), "actions-pinning<v4>");
    }
}
