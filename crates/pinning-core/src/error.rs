use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("cannot read workflow directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read workflow {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Valid YAML that cannot be edited in place, such as anchors and aliases.
    #[error("cannot pin {path} in place: {message}")]
    Unsupported { path: PathBuf, message: String },

    #[error("{0} is not a YAML mapping")]
    NotAMapping(PathBuf),

    #[error("No jobs found at {0}")]
    NoJobs(PathBuf),

    #[error("jobs in {0} is not a mapping")]
    InvalidJobs(PathBuf),

    #[error("Can't find job {job} in {path}")]
    JobNotFound { path: PathBuf, job: String },

    #[error("Can't find steps of job {job} in {path}")]
    StepsNotFound { path: PathBuf, job: String },

    #[error("Can't find step {step} of job {job} in {path}")]
    StepNotFound {
        path: PathBuf,
        job: String,
        step: usize,
    },

    #[error("Step {step} of job {job} doesn't have \"uses\" in {path}")]
    UsesNotFound {
        path: PathBuf,
        job: String,
        step: usize,
    },

    #[error("step {step} of job {job} in {path} changed from '{expected}' to '{found}'")]
    UsesChanged {
        path: PathBuf,
        job: String,
        step: usize,
        expected: String,
        found: String,
    },

    #[error("{action}@{version} was never discovered (needed by {path})")]
    Unregistered {
        path: PathBuf,
        action: String,
        version: String,
    },

    #[error("{action}@{version} was never resolved (needed by {path})")]
    Unresolved {
        path: PathBuf,
        action: String,
        version: String,
    },

    #[error("cannot locate '{value}' on line {line} of {path}")]
    Unlocatable {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("git not found in PATH: install git to resolve action tags")]
    GitNotFound,

    #[error("failed to run git: {0}")]
    GitSpawn(String),

    #[error("cannot understand remote ref line '{0}'")]
    UnexpectedRef(String),

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PinError>;
