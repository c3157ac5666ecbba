//! Pin the references found by the extractor to their resolved commits.

use crate::action::annotation;
use crate::discovery::DiscoveryIndex;
use crate::error::{PinError, Result};
use crate::extract::FoundAction;
use crate::workflow::{scalar_position, ScalarEdit, Workflow, STEPS_KEY, USES_KEY};
use marked_yaml::types::MarkedScalarNode;
use serde::Serialize;

/// One rewritten `uses:` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pin {
    pub job: String,
    pub step: usize,
    pub action: String,
    pub from: String,
    pub commit: String,
}

/// Rewrite every reference in `found` inside `workflow`.
///
/// Each reference is re-navigated from the document root. Any missing hop,
/// a value that no longer matches what was extracted, or a pair the index
/// never resolved is an error, and in that case the workflow is left
/// untouched.
pub fn rewrite(
    workflow: &mut Workflow,
    found: &[FoundAction],
    index: &DiscoveryIndex,
) -> Result<Vec<Pin>> {
    let mut edits = Vec::with_capacity(found.len());
    let mut pins = Vec::with_capacity(found.len());

    for action in found {
        let uses = locate_uses(workflow, action)?;
        let path = workflow.path();

        if uses.as_str() != action.raw {
            return Err(PinError::UsesChanged {
                path: path.to_path_buf(),
                job: action.job.clone(),
                step: action.step,
                expected: action.raw.clone(),
                found: uses.as_str().to_string(),
            });
        }

        let (identity, version) = (&action.action.identity, &action.action.version);
        if !index.contains(identity, version) {
            return Err(PinError::Unregistered {
                path: path.to_path_buf(),
                action: identity.to_string(),
                version: version.clone(),
            });
        }
        let commit = index
            .lookup(identity, version)
            .ok_or_else(|| PinError::Unresolved {
                path: path.to_path_buf(),
                action: identity.to_string(),
                version: version.clone(),
            })?;

        let (line, column) = scalar_position(uses).ok_or_else(|| PinError::Unlocatable {
            path: path.to_path_buf(),
            line: 0,
            value: action.raw.clone(),
        })?;

        edits.push(ScalarEdit {
            line,
            column,
            original: action.raw.clone(),
            replacement: action.action.pinned_to(commit),
            comment: annotation(&action.action.version),
        });
        pins.push(Pin {
            job: action.job.clone(),
            step: action.step,
            action: action.action.name(),
            from: action.action.version.clone(),
            commit: commit.to_string(),
        });
    }

    for edit in workflow.apply(edits)? {
        tracing::warn!(
            file = %workflow.path().display(),
            line = edit.line,
            "pinned {} but the line continues after it; add the '{}' comment by hand",
            edit.replacement,
            edit.comment
        );
    }
    Ok(pins)
}

/// Walk `jobs.<job>.steps[<step>].uses`, checking every hop.
fn locate_uses<'a>(workflow: &'a Workflow, action: &FoundAction) -> Result<&'a MarkedScalarNode> {
    let path = workflow.path();
    let job = workflow
        .jobs()?
        .get_mapping(&action.job)
        .ok_or_else(|| PinError::JobNotFound {
            path: path.to_path_buf(),
            job: action.job.clone(),
        })?;

    let steps = job
        .get_sequence(STEPS_KEY)
        .ok_or_else(|| PinError::StepsNotFound {
            path: path.to_path_buf(),
            job: action.job.clone(),
        })?;

    let step = steps
        .get(action.step)
        .and_then(|node| node.as_mapping())
        .ok_or_else(|| PinError::StepNotFound {
            path: path.to_path_buf(),
            job: action.job.clone(),
            step: action.step,
        })?;

    step.get_scalar(USES_KEY).ok_or_else(|| PinError::UsesNotFound {
        path: path.to_path_buf(),
        job: action.job.clone(),
        step: action.step,
    })
}
