//! Core domain models
//!
//! Configuration resolution, the source layout, and the pipeline
//! definitions derived from them. Nothing in here runs a transform.

pub mod banner;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod schema;
pub mod state;

pub use config::{BuildConfig, ConfigFormat, ConfigResolver, StyleDialect};
pub use error::{BuildError, ConfigError, LayoutError, PipelineError, StepFailure, TransformWarning};
pub use layout::{AssetDir, DirectorySet, LayoutPlanner, ProjectPaths};
pub use pipeline::{PipelineDefinition, PipelineName, PipelineRegistry, PipelineSet, Step};
pub use state::{BuildOutcome, BuildReport, PipelineStatus};
