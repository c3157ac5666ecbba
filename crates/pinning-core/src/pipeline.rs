//! Extract-all → resolve-all → rewrite-all.
//!
//! [`Pipeline`] owns the parsed workflows, the references found in each and
//! the shared [`DiscoveryIndex`]. Each phase takes the pipeline by reference
//! (or by value for the last one), so a phase can only start once the
//! previous one has fully finished.

use crate::discovery::DiscoveryIndex;
use crate::error::{PinError, Result};
use crate::extract::{extract, ExtractPolicy, FoundAction};
use crate::paths;
use crate::resolve::{resolve, RefSource, ResolveReport};
use crate::rewrite::{rewrite, Pin};
use crate::workflow::Workflow;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct Document {
    workflow: Workflow,
    found: Vec<FoundAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixedFile {
    pub path: PathBuf,
    pub pins: Vec<Pin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub workflow_dir: PathBuf,
    pub scanned: Vec<PathBuf>,
    pub fixed: Vec<FixedFile>,
    pub resolve: ResolveReport,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }

    pub fn pin_count(&self) -> usize {
        self.fixed.iter().map(|f| f.pins.len()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct Pipeline {
    workflow_dir: PathBuf,
    files: Vec<PathBuf>,
    documents: Vec<Document>,
    skipped: Vec<FileFailure>,
    index: DiscoveryIndex,
    resolve: ResolveReport,
}

impl Pipeline {
    /// Read and extract every workflow in `workflow_dir`, in file-name order.
    ///
    /// A file that cannot be read or parsed, or has no `jobs`, aborts the run.
    /// Valid YAML that cannot be edited in place is skipped and reported as a
    /// failure when the run is written.
    pub fn discover(workflow_dir: &Path, policy: &ExtractPolicy) -> Result<Self> {
        let files = paths::list_workflow_files(workflow_dir)?;
        let mut index = DiscoveryIndex::new();
        let mut documents = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();

        for path in &files {
            tracing::debug!(file = %path.display(), "extracting");
            let workflow = match Workflow::load(path) {
                Ok(workflow) => workflow,
                Err(e @ PinError::Unsupported { .. }) => {
                    tracing::warn!(file = %path.display(), "{e}");
                    skipped.push(FileFailure {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };
            let found = extract(&workflow, &mut index, policy)?;
            documents.push(Document { workflow, found });
        }

        tracing::debug!(
            pairs = index.len(),
            actions = index.identity_count(),
            "discovery finished"
        );
        Ok(Self {
            workflow_dir: workflow_dir.to_path_buf(),
            files,
            documents,
            skipped,
            index,
            resolve: ResolveReport::default(),
        })
    }

    /// Every workflow file found, including skipped ones.
    pub fn files(&self) -> Vec<&Path> {
        self.files.iter().map(PathBuf::as_path).collect()
    }

    /// `true` when at least one reference needs a remote lookup.
    pub fn needs_resolution(&self) -> bool {
        self.index.unresolved().next().is_some()
    }

    /// Resolve every pending pair. All queries are joined before this returns.
    pub async fn resolve<S: RefSource>(&mut self, source: Arc<S>) -> &ResolveReport {
        let report = resolve(&mut self.index, source).await;
        self.resolve.queries += report.queries;
        self.resolve.resolved += report.resolved;
        self.resolve.failures.extend(report.failures);
        &self.resolve
    }

    /// Rewrite and save every workflow that has references.
    ///
    /// A document that fails is left untouched on disk and reported; the
    /// remaining documents are still written.
    pub fn write(self) -> RunReport {
        let mut report = RunReport {
            workflow_dir: self.workflow_dir,
            scanned: self.files,
            resolve: self.resolve,
            failures: self.skipped,
            ..Default::default()
        };

        for Document {
            mut workflow,
            found,
        } in self.documents
        {
            let path = workflow.path().to_path_buf();
            if found.is_empty() {
                continue;
            }

            let outcome = rewrite(&mut workflow, &found, &self.index)
                .and_then(|pins| workflow.save().map(|()| pins));
            match outcome {
                Ok(pins) => {
                    tracing::info!(" ─ {}", path.display());
                    report.fixed.push(FixedFile { path, pins });
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), "{e}");
                    report.failures.push(FileFailure {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
