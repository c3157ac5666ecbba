//! Find every `uses:` reference in a workflow that can be pinned.

use crate::action::{ActionUse, DOCKER_PREFIX, LOCAL_PREFIX};
use crate::discovery::DiscoveryIndex;
use crate::error::Result;
use crate::workflow::{Workflow, STEPS_KEY, USES_KEY};
use marked_yaml::types::Node;
use serde::Serialize;
use std::path::PathBuf;

/// Which references are left alone.
#[derive(Debug, Clone)]
pub struct ExtractPolicy {
    pub ignore_authors: Vec<String>,
    /// Version assumed when `uses:` has no `@`.
    pub default_ref: String,
}

impl ExtractPolicy {
    pub fn is_ignored(&self, owner: &str) -> bool {
        self.ignore_authors.iter().any(|a| a == owner)
    }
}

/// One pinnable occurrence, addressed by job and step index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundAction {
    pub file: PathBuf,
    pub job: String,
    /// Zero-based index into the job's `steps`.
    pub step: usize,
    pub action: ActionUse,
    /// The `uses:` value as written.
    pub raw: String,
}

/// How a single `uses:` value is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsesClass {
    Local,
    Docker,
    NotRepository,
    IgnoredAuthor(ActionUse),
    Pinned(ActionUse),
    Pinnable(ActionUse),
}

pub fn classify(raw: &str, policy: &ExtractPolicy) -> UsesClass {
    if raw.starts_with(LOCAL_PREFIX) {
        return UsesClass::Local;
    }
    if raw.starts_with(DOCKER_PREFIX) {
        return UsesClass::Docker;
    }
    let Some(action) = ActionUse::parse(raw, &policy.default_ref) else {
        return UsesClass::NotRepository;
    };
    if policy.is_ignored(&action.identity.owner) {
        UsesClass::IgnoredAuthor(action)
    } else if action.is_pinned() {
        UsesClass::Pinned(action)
    } else {
        UsesClass::Pinnable(action)
    }
}

/// Walk the jobs of `workflow` in declared order and collect every pinnable
/// reference, registering each `(identity, version)` pair in `index`.
///
/// Nothing here is an error except a missing `jobs` mapping: malformed jobs
/// and steps are skipped.
pub fn extract(
    workflow: &Workflow,
    index: &mut DiscoveryIndex,
    policy: &ExtractPolicy,
) -> Result<Vec<FoundAction>> {
    let file = workflow.path();
    let mut found = Vec::new();

    for (job_key, job_node) in workflow.jobs()?.iter() {
        let job_name = job_key.as_str();
        let Node::Mapping(job) = job_node else {
            tracing::debug!(file = %file.display(), job = job_name, "skipping empty job");
            continue;
        };

        if job.get_node(USES_KEY).is_some() {
            tracing::debug!(
                file = %file.display(),
                job = job_name,
                "skipping job: it calls a reusable workflow or composite action"
            );
            continue;
        }

        let Some(steps) = job.get_sequence(STEPS_KEY) else {
            tracing::debug!(file = %file.display(), job = job_name, "skipping job without steps");
            continue;
        };

        for (step_index, step) in steps.iter().enumerate() {
            let Some(uses) = step.as_mapping().and_then(|s| s.get_scalar(USES_KEY)) else {
                tracing::debug!(job = job_name, step = step_index, "skipping step without uses");
                continue;
            };
            let raw = uses.as_str();

            match classify(raw, policy) {
                UsesClass::Local => {
                    tracing::debug!(job = job_name, step = step_index, uses = raw, "skipping local action");
                }
                UsesClass::Docker => {
                    tracing::debug!(job = job_name, step = step_index, uses = raw, "skipping docker image");
                }
                UsesClass::NotRepository => {
                    tracing::warn!(
                        file = %file.display(),
                        job = job_name,
                        step = step_index,
                        uses = raw,
                        "skipping step: uses is not owner/repo"
                    );
                }
                UsesClass::IgnoredAuthor(action) => {
                    tracing::debug!(job = job_name, step = step_index, action = %action.name(), "skipping ignored author");
                }
                UsesClass::Pinned(action) => {
                    tracing::debug!(job = job_name, step = step_index, action = %action, "already pinned to a commit");
                }
                UsesClass::Pinnable(action) => {
                    tracing::debug!(job = job_name, step = step_index, action = %action, "not pinned");
                    index.register(&action.identity, &action.version);
                    found.push(FoundAction {
                        file: file.to_path_buf(),
                        job: job_name.to_string(),
                        step: step_index,
                        action,
                        raw: raw.to_string(),
                    });
                }
            }
        }
    }

    Ok(found)
}
