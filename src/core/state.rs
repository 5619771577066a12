//! Build outcome models

use crate::core::error::{PipelineError, TransformWarning};
use crate::core::pipeline::PipelineName;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// Final status of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStatus {
    Succeeded,
    Failed,
}

/// Result of running one pipeline
#[derive(Debug)]
pub struct BuildOutcome {
    pub pipeline: PipelineName,

    pub status: PipelineStatus,

    /// Source files read
    pub files_processed: usize,

    /// Bytes written across all artifacts (source maps excluded)
    pub total_bytes: u64,

    /// Bytes written for `.min` artifacts
    pub minified_bytes: u64,

    /// Paths of written artifacts, in write order
    pub artifacts: Vec<PathBuf>,

    pub warnings: Vec<TransformWarning>,

    pub error: Option<PipelineError>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl BuildOutcome {
    /// A fresh outcome, marked started now
    pub fn start(pipeline: PipelineName) -> Self {
        let now = Utc::now();
        Self {
            pipeline,
            status: PipelineStatus::Succeeded,
            files_processed: 0,
            total_bytes: 0,
            minified_bytes: 0,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            error: None,
            started_at: now,
            completed_at: now,
        }
    }

    /// Close the outcome, recording the fatal error if there was one
    pub fn finish(mut self, result: Result<(), PipelineError>) -> Self {
        if let Err(error) = result {
            self.status = PipelineStatus::Failed;
            self.error = Some(error);
        }
        self.completed_at = Utc::now();
        self
    }

    pub fn succeeded(&self) -> bool {
        self.status == PipelineStatus::Succeeded
    }

    pub fn duration(&self) -> std::time::Duration {
        self.completed_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Aggregated outcomes of a full build
#[derive(Debug)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub outcomes: Vec<BuildOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, pipeline: PipelineName) -> Option<&BuildOutcome> {
        self.outcomes.iter().find(|o| o.pipeline == pipeline)
    }
}
