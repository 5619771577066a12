//! Main build orchestrator - runs the full build, then hands over to watch mode

use crate::core::config::BuildConfig;
use crate::core::error::{BuildError, PipelineError, StepFailure, TransformWarning};
use crate::core::layout::ProjectPaths;
use crate::core::pipeline::{PipelineName, PipelineRegistry, PipelineSet};
use crate::core::state::{BuildOutcome, BuildReport};
use crate::execution::reload::{live_reload_for, LiveReload, ReloadScope};
use crate::execution::runner::PipelineRunner;
use crate::execution::scheduler::{BuildPlan, SchedulingStrategy};
use crate::execution::watcher::{
    watch_bindings, ChangeSource, FsEventSource, Rebuild, RerunQueue, Subscription, WatchError,
    Watcher,
};
use crate::tools::Toolchain;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a build or watch session
#[derive(Debug, Clone)]
pub enum BuildEvent {
    BuildStarted {
        build_id: Uuid,
        pipelines: Vec<PipelineName>,
    },
    Cleaned {
        path: PathBuf,
    },
    PipelineStarted {
        pipeline: PipelineName,
    },
    StageMeasured {
        pipeline: PipelineName,
        stage: &'static str,
        files: usize,
        bytes: u64,
    },
    TransformWarning {
        pipeline: PipelineName,
        warning: TransformWarning,
    },
    PipelineCompleted {
        pipeline: PipelineName,
        files_processed: usize,
        artifacts: usize,
        duration: Duration,
    },
    PipelineFailed {
        pipeline: PipelineName,
        error: String,
    },
    BuildFinished {
        build_id: Uuid,
        succeeded: usize,
        failed: usize,
        duration: Duration,
    },
    LiveReloadStarted {
        port: u16,
    },
    WatchStarted {
        roots: Vec<PathBuf>,
    },
    ChangeDetected {
        path: PathBuf,
        pipelines: Vec<PipelineName>,
    },
    ReloadRequested {
        pipeline: PipelineName,
        scope: ReloadScope,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(BuildEvent) + Send + Sync>;

/// Fan-out of events to every registered handler
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Vec<EventHandler>,
}

impl EventSink {
    pub fn add<F>(&mut self, handler: F)
    where
        F: Fn(BuildEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn emit(&self, event: BuildEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Reruns a pipeline from the resolved set
struct PipelineRebuilder {
    runner: PipelineRunner,
    pipelines: Arc<PipelineSet>,
}

#[async_trait]
impl Rebuild for PipelineRebuilder {
    async fn rebuild(&self, pipeline: PipelineName) -> bool {
        match self.pipelines.get(pipeline) {
            Some(definition) => self.runner.run(definition).await.succeeded(),
            None => {
                warn!("No {} pipeline configured", pipeline);
                false
            }
        }
    }
}

/// Main build orchestrator
pub struct Orchestrator {
    config: Arc<BuildConfig>,
    pipelines: Arc<PipelineSet>,
    plan: BuildPlan,
    strategy: SchedulingStrategy,
    toolchain: Arc<Toolchain>,
    banner: Option<Arc<str>>,
    reload: Arc<dyn LiveReload>,
    events: EventSink,
}

impl Orchestrator {
    pub fn new(config: Arc<BuildConfig>, strategy: SchedulingStrategy) -> Self {
        let pipelines = PipelineRegistry::build(&config);
        let plan = BuildPlan::new(&config, &pipelines);
        let toolchain = Arc::new(Toolchain::from_config(&config.tools));
        let reload = live_reload_for(&config);

        Self {
            config,
            pipelines: Arc::new(pipelines),
            plan,
            strategy,
            toolchain,
            banner: None,
            reload,
            events: EventSink::default(),
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Arc::new(toolchain);
        self
    }

    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner.map(Arc::from);
        self
    }

    pub fn with_live_reload(mut self, reload: Arc<dyn LiveReload>) -> Self {
        self.reload = reload;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(BuildEvent) + Send + Sync + 'static,
    {
        self.events.add(handler);
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    pub fn runner(&self) -> PipelineRunner {
        PipelineRunner::new(self.toolchain.clone(), ProjectPaths::from_config(&self.config))
            .with_banner(self.banner.clone())
            .with_events(self.events.clone())
    }

    /// Remove the whole output directory; a missing one is fine
    pub async fn clean(&self) -> Result<(), BuildError> {
        let dist = &self.config.dist_folder;
        match tokio::fs::remove_dir_all(dist).await {
            Ok(()) => info!("Cleaned {}", dist.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(BuildError::Clean {
                    path: dist.clone(),
                    source,
                })
            }
        }
        self.events.emit(BuildEvent::Cleaned { path: dist.clone() });
        Ok(())
    }

    /// Clean, then run every pipeline of the plan
    pub async fn build(&self) -> Result<BuildReport, BuildError> {
        let build_id = Uuid::new_v4();
        let started_at = Utc::now();
        let names = self.plan.pipelines();

        info!("Starting build {} ({:?})", build_id, self.strategy);
        self.events.emit(BuildEvent::BuildStarted {
            build_id,
            pipelines: names.clone(),
        });

        self.clean().await?;
        let outcomes = self.run_pipelines(&names).await;

        let report = BuildReport {
            build_id,
            outcomes,
            started_at,
            completed_at: Utc::now(),
        };
        info!(
            "Build {} finished: {} succeeded, {} failed",
            build_id,
            report.succeeded(),
            report.failed()
        );
        self.events.emit(BuildEvent::BuildFinished {
            build_id,
            succeeded: report.succeeded(),
            failed: report.failed(),
            duration: report
                .completed_at
                .signed_duration_since(report.started_at)
                .to_std()
                .unwrap_or_default(),
        });
        Ok(report)
    }

    /// Run the named pipelines per the strategy; outcomes come back in the given order
    async fn run_pipelines(&self, names: &[PipelineName]) -> Vec<BuildOutcome> {
        let runner = self.runner();
        let definitions: Vec<_> = names
            .iter()
            .filter_map(|name| self.pipelines.get(*name).cloned())
            .collect();

        if self.strategy == SchedulingStrategy::Sequential {
            let mut outcomes = Vec::with_capacity(definitions.len());
            for definition in definitions {
                let name = definition.name;
                let runner = runner.clone();
                let outcome = match tokio::spawn(async move { runner.run(&definition).await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => self.aborted(name, e.to_string()),
                };
                outcomes.push(outcome);
            }
            return outcomes;
        }

        let semaphore = Arc::new(Semaphore::new(
            self.strategy.concurrency(definitions.len()),
        ));
        let order: Vec<PipelineName> = definitions.iter().map(|d| d.name).collect();
        let mut tasks = JoinSet::new();
        for (index, definition) in definitions.into_iter().enumerate() {
            let runner = runner.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, runner.run(&definition).await)
            });
        }

        let mut slots: Vec<Option<BuildOutcome>> = (0..order.len()).map(|_| None).collect();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => failures.push(e.to_string()),
            }
        }

        // a panicked task loses its index; every empty slot belongs to one
        let cause = failures.join("; ");
        slots
            .into_iter()
            .zip(order)
            .map(|(slot, name)| slot.unwrap_or_else(|| self.aborted(name, cause.clone())))
            .collect()
    }

    /// Failed outcome for a pipeline whose task did not return
    fn aborted(&self, pipeline: PipelineName, message: String) -> BuildOutcome {
        error!("Pipeline {} aborted: {}", pipeline, message);
        let cause = StepFailure::Aborted(message);
        self.events.emit(BuildEvent::PipelineFailed {
            pipeline,
            error: cause.to_string(),
        });
        BuildOutcome::start(pipeline).finish(Err(PipelineError { pipeline, cause }))
    }

    /// Start the live-reload server; failures are only logged
    pub async fn start_live_reload(&self) {
        match self.reload.start().await {
            Ok(()) => self.events.emit(BuildEvent::LiveReloadStarted {
                port: self.config.browsersync.port,
            }),
            Err(e) => warn!("Live-reload unavailable: {}", e),
        }
    }

    /// Start routing changes from `source` to pipeline reruns
    pub fn watch<S: ChangeSource>(&self, source: S) -> Result<Subscription, WatchError> {
        let rebuild = Arc::new(PipelineRebuilder {
            runner: self.runner(),
            pipelines: self.pipelines.clone(),
        });
        let queue = RerunQueue::new(rebuild, self.reload.clone(), self.events.clone());
        let bindings = watch_bindings(&self.config, &self.pipelines);
        Watcher::new(bindings, queue, self.events.clone()).start(source)
    }

    /// Full build, live-reload, then watch until Ctrl-C
    pub async fn run(&self) -> Result<(), BuildError> {
        self.build().await?;
        self.serve().await
    }

    /// Live-reload (when planned) and watch until Ctrl-C
    pub async fn serve(&self) -> Result<(), BuildError> {
        if self.plan.starts_live_reload() {
            self.start_live_reload().await;
        }

        let debounce = Duration::from_millis(self.config.watch.debounce_ms);
        let subscription = self.watch(FsEventSource::new(debounce))?;

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        subscription.cancel();
        Ok(())
    }
}
