//! Build execution: pipeline runs, orchestration and watch mode

pub mod engine;
pub mod reload;
pub mod runner;
pub mod scheduler;
pub mod watcher;

pub use engine::{BuildEvent, EventHandler, EventSink, Orchestrator};
pub use reload::{BrowserSync, LiveReload, NoReload, ReloadScope};
pub use runner::PipelineRunner;
pub use scheduler::{BuildPlan, PlanStep, SchedulingStrategy};
pub use watcher::{
    ChangeSource, ChannelEventSource, FsEventSource, Rebuild, RerunQueue, Subscription,
    WatchBinding, WatchError, Watcher,
};
