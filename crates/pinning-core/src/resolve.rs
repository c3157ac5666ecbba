//! Resolve tags to commits with `git ls-remote`.
//!
//! Each action identity with pending versions gets exactly one query that
//! asks for all of its versions at once. Queries for different identities run
//! concurrently and are all joined before [`resolve`] returns.
//!
//! # Output format
//! `git ls-remote --tags <url> <pattern>...` prints one `<sha>\t<ref>` per
//! line. Annotated tags are listed twice: `refs/tags/v1` carries the tag
//! object and `refs/tags/v1^{}` the commit it points to. The peeled commit
//! wins whenever both are present.

use crate::action::ActionIdentity;
use crate::discovery::{DiscoveryIndex, Record};
use crate::error::{PinError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

const TAG_PREFIX: &str = "refs/tags/";
const PEELED_SUFFIX: &str = "^{}";

// ---------------------------------------------------------------------------
// Ref sources
// ---------------------------------------------------------------------------

/// Raw output of one remote query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    pub stdout: String,
    pub stderr: String,
}

/// Anything that can list the tags of a repository.
pub trait RefSource: Send + Sync + 'static {
    fn list_tags(
        &self,
        identity: &ActionIdentity,
        tags: &[String],
    ) -> impl Future<Output = Result<RemoteListing>> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    #[default]
    Https,
    Ssh,
}

impl Transport {
    pub fn url(&self, identity: &ActionIdentity) -> String {
        match self {
            Transport::Https => identity.https_url(),
            Transport::Ssh => identity.ssh_url(),
        }
    }
}

/// Queries GitHub through the local `git` binary.
#[derive(Debug, Clone)]
pub struct GitRemote {
    git: PathBuf,
    transport: Transport,
    /// Serves `<base>/<owner>/<repo>` instead of GitHub.
    base_url: Option<String>,
}

impl GitRemote {
    /// Locate `git` on `PATH`.
    pub fn detect(transport: Transport) -> Result<Self> {
        let git = which::which("git").map_err(|_| PinError::GitNotFound)?;
        Ok(Self {
            git,
            transport,
            base_url: None,
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    fn url(&self, identity: &ActionIdentity) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{}/{}", identity.owner, identity.repo),
            None => self.transport.url(identity),
        }
    }
}

/// `ls-remote` patterns for the requested tags. The peeled form has to be
/// asked for explicitly or annotated tags only report the tag object.
fn tag_patterns(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|tag| [tag.clone(), format!("{tag}{PEELED_SUFFIX}")])
        .collect()
}

impl RefSource for GitRemote {
    async fn list_tags(&self, identity: &ActionIdentity, tags: &[String]) -> Result<RemoteListing> {
        let url = self.url(identity);
        tracing::trace!(url = %url, ?tags, "git ls-remote");

        let output = Command::new(&self.git)
            .args(["ls-remote", "--tags", url.as_str()])
            .args(tag_patterns(tags))
            // Fail instead of prompting for credentials on private or missing repos.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PinError::GitSpawn(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() && stderr.trim().is_empty() {
            stderr = format!("git ls-remote exited with {}", output.status);
        }
        Ok(RemoteListing { stdout, stderr })
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTag {
    pub commit: String,
    pub tag: String,
    /// `true` for the `^{}` line of an annotated tag.
    pub peeled: bool,
}

/// Parse `git ls-remote` output. Blank lines are ignored; every other line
/// yields either a tag or an error for that line alone.
pub fn parse_ls_remote(stdout: &str) -> Vec<Result<RemoteTag>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<RemoteTag> {
    let unexpected = || PinError::UnexpectedRef(line.to_string());
    let (commit, reference) = line.split_once('\t').ok_or_else(unexpected)?;
    let name = reference.strip_prefix(TAG_PREFIX).ok_or_else(unexpected)?;
    let (tag, peeled) = match name.strip_suffix(PEELED_SUFFIX) {
        Some(tag) => (tag, true),
        None => (name, false),
    };
    if commit.is_empty() || tag.is_empty() {
        return Err(unexpected());
    }
    Ok(RemoteTag {
        commit: commit.to_string(),
        tag: tag.to_string(),
        peeled,
    })
}

/// Collapse parsed tags to one commit per tag name, preferring peeled entries.
fn commits_by_tag(tags: Vec<RemoteTag>) -> BTreeMap<String, String> {
    let mut commits: BTreeMap<String, (String, bool)> = BTreeMap::new();
    for t in tags {
        let keep_existing = match commits.get(&t.tag) {
            Some((_, existing_peeled)) => *existing_peeled || !t.peeled,
            None => false,
        };
        if !keep_existing {
            commits.insert(t.tag, (t.commit, t.peeled));
        }
    }
    commits
        .into_iter()
        .map(|(tag, (commit, _))| (tag, commit))
        .collect()
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveFailure {
    pub action: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolveReport {
    /// Number of remote queries issued.
    pub queries: usize,
    /// Number of `(identity, version)` pairs that received a commit.
    pub resolved: usize,
    pub failures: Vec<ResolveFailure>,
}

/// Query every identity with pending versions and record the commits.
///
/// A failing query only affects its own identity; its versions stay
/// unresolved and are reported in [`ResolveReport::failures`].
pub async fn resolve<S: RefSource>(index: &mut DiscoveryIndex, source: Arc<S>) -> ResolveReport {
    let pending = index.pending();
    let mut report = ResolveReport {
        queries: pending.len(),
        ..Default::default()
    };
    if pending.is_empty() {
        return report;
    }

    let mut tasks = tokio::task::JoinSet::new();
    for (identity, versions) in pending {
        for version in &versions {
            tracing::info!("{identity}@{version} → ...");
        }
        let source = Arc::clone(&source);
        tasks.spawn(async move {
            let listing = source.list_tags(&identity, &versions).await;
            (identity, listing)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (identity, listing) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!("resolver task failed: {e}");
                report.failures.push(ResolveFailure {
                    action: "<unknown>".to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(action = %identity, "{e}");
                report.failures.push(ResolveFailure {
                    action: identity.to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !listing.stderr.trim().is_empty() {
            let message = listing.stderr.trim().to_string();
            tracing::error!(action = %identity, "exec error: {message}");
            report.failures.push(ResolveFailure {
                action: identity.to_string(),
                message,
            });
            continue;
        }

        tracing::trace!(action = %identity, stdout = %listing.stdout, "ls-remote output");
        report.resolved += record_listing(index, &identity, &listing.stdout);
    }

    report
}

/// Record one identity's listing into the index. Returns how many pending
/// pairs were filled.
fn record_listing(index: &mut DiscoveryIndex, identity: &ActionIdentity, stdout: &str) -> usize {
    let mut tags = Vec::new();
    for parsed in parse_ls_remote(stdout) {
        match parsed {
            Ok(tag) => tags.push(tag),
            Err(e) => tracing::error!(action = %identity, "{e}"),
        }
    }

    let mut resolved = 0;
    for (tag, commit) in commits_by_tag(tags) {
        match index.record(identity, &tag, &commit) {
            Record::Resolved => {
                resolved += 1;
                tracing::info!("{identity}@{tag} → {commit}");
            }
            Record::Unchanged => {}
            Record::Conflict { existing } => {
                tracing::warn!(
                    action = %identity,
                    tag = %tag,
                    "remote reports {commit}, keeping {existing}"
                );
            }
            Record::Unrequested => {
                tracing::debug!(action = %identity, tag = %tag, "ignoring tag that was not requested");
            }
        }
    }
    resolved
}
