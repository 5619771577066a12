//! Command-line interface

pub mod output;

use crate::execution::SchedulingStrategy;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Build, watch and live-reload front-end assets for one project
#[derive(Debug, Parser, Clone)]
#[command(name = "boost")]
#[command(version)]
#[command(about = "Front-end asset pipeline: build once, then watch and live-reload", long_about = None)]
pub struct Cli {
    /// Project entry to build from the config file
    #[arg(short, long)]
    pub project: String,

    /// Path to the project config file (JSON or YAML)
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Scheduling strategy for the initial build
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Concurrent pipelines with `--strategy parallel-limited`
    #[arg(long, default_value_t = 2)]
    pub jobs: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(self.jobs),
        }
    }
}
