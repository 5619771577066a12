//! frontend-boost - a configurable front-end asset build pipeline

pub mod cli;
pub mod core;
pub mod execution;
pub mod tools;

// Re-export commonly used types
pub use core::{BuildConfig, BuildOutcome, BuildReport, ConfigResolver, PipelineName, PipelineRegistry};
pub use execution::{BuildEvent, Orchestrator, PipelineRunner, SchedulingStrategy};
pub use tools::{AssetTool, ToolError, ToolInput, Toolchain};
