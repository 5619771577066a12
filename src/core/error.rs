//! Error taxonomy for configuration, scaffolding and pipeline execution

use crate::core::pipeline::PipelineName;
use crate::tools::ToolError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single schema problem, addressed by its dotted field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} {}", self.path, self.message)
        }
    }
}

/// Errors raised while resolving the project configuration.
///
/// Every variant is fatal and is raised before any file is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file is not a valid document: {0}")]
    MalformedInput(String),

    #[error("Project '{project}' doesn't exist in the config file (available: {})", available.join(", "))]
    MissingProject {
        project: String,
        available: Vec<String>,
    },

    #[error("Config for project '{project}' is not valid:\n{}", format_violations(violations))]
    SchemaViolation {
        project: String,
        violations: Vec<SchemaViolation>,
    },

    #[error("Choose either Sass or Less (not both) as the CSS preprocessor for project '{project}'")]
    ConflictingOptions { project: String },

    #[error("distFolder {dist} and srcFolder {src} must not overlap: distFolder is deleted on every build")]
    InvalidLayout { src: PathBuf, dist: PathBuf },

    #[error("Failed to load package metadata from {path}: {message}")]
    PackageMetadata { path: PathBuf, message: String },
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors raised while scaffolding the source tree
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The cause of a fatal step failure inside a pipeline
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed on {path}: {source}")]
    Tool {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("invalid source pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("pipeline task aborted: {0}")]
    Aborted(String),
}

/// A fatal failure of one pipeline; siblings keep running
#[derive(Debug, Error)]
#[error("pipeline '{pipeline}' failed: {cause}")]
pub struct PipelineError {
    pub pipeline: PipelineName,
    #[source]
    pub cause: StepFailure,
}

/// A non-fatal transform problem (lint findings, best-effort minify failures)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformWarning {
    pub step: &'static str,
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.step, self.path.display(), self.message)
    }
}

/// Errors that stop the orchestrator itself
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to clean output directory {path}: {source}")]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Watch(#[from] crate::execution::watcher::WatchError),
}
