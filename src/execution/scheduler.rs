//! Build plan and scheduling strategy - decides what runs and in which order

use crate::core::config::BuildConfig;
use crate::core::pipeline::{PipelineName, PipelineSet};
use std::fmt;

/// Strategy for scheduling pipeline execution during a full build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Execute pipelines in plan order, one at a time
    Sequential,

    /// Execute all pipelines concurrently
    Parallel,

    /// Limited parallelism (max N concurrent pipelines)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

impl SchedulingStrategy {
    /// Upper bound on concurrently running pipelines for `total` pipelines
    pub fn concurrency(self, total: usize) -> usize {
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => total.max(1),
            SchedulingStrategy::LimitedParallel(max) => max.clamp(1, total.max(1)),
        }
    }
}

/// One entry of the full build order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    /// Remove the output directory
    Clean,
    Pipeline(PipelineName),
    StartLiveReload,
    Watch,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Clean => f.write_str("clean"),
            PlanStep::Pipeline(name) => write!(f, "{}", name),
            PlanStep::StartLiveReload => f.write_str("browsersync"),
            PlanStep::Watch => f.write_str("watch"),
        }
    }
}

/// The ordered steps of a full build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    steps: Vec<PlanStep>,
}

impl BuildPlan {
    /// clean, the pipelines in registry order, live-reload if enabled, watch
    pub fn new(config: &BuildConfig, pipelines: &PipelineSet) -> Self {
        let mut steps = vec![PlanStep::Clean];
        steps.extend(pipelines.names().into_iter().map(PlanStep::Pipeline));
        if config.browsersync.enabled {
            steps.push(PlanStep::StartLiveReload);
        }
        steps.push(PlanStep::Watch);
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Pipelines of the initial build, in plan order
    pub fn pipelines(&self) -> Vec<PipelineName> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                PlanStep::Pipeline(name) => Some(*name),
                _ => None,
            })
            .collect()
    }

    pub fn starts_live_reload(&self) -> bool {
        self.steps.contains(&PlanStep::StartLiveReload)
    }
}
