//! Watch mode - maps file changes to pipeline reruns
//!
//! Changes arrive from a [`ChangeSource`] (the file system in production, a
//! channel in tests), are matched against the per-category [`WatchBinding`]s
//! and handed to the [`RerunQueue`], which keeps at most one run in flight per
//! pipeline and coalesces bursts into a single follow-up run.

use crate::core::config::BuildConfig;
use crate::core::layout::{AssetDir, ProjectPaths};
use crate::core::pipeline::{PipelineName, PipelineSet};
use crate::execution::engine::{BuildEvent, EventSink};
use crate::execution::reload::{LiveReload, ReloadScope};
use async_trait::async_trait;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to initialize file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// A glob under a source directory and the pipelines it feeds
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub base: PathBuf,
    pub pattern: glob::Pattern,
    pub pipelines: Vec<PipelineName>,
}

impl WatchBinding {
    pub fn matches(&self, path: &Path) -> bool {
        path.strip_prefix(&self.base)
            .map(|relative| self.pattern.matches_path(relative))
            .unwrap_or(false)
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Category bindings for a configuration's pipelines
pub fn watch_bindings(config: &BuildConfig, pipelines: &PipelineSet) -> Vec<WatchBinding> {
    let paths = ProjectPaths::from_config(config);
    let has_theme = pipelines.get(PipelineName::Theme).is_some();

    let mut specs: Vec<(AssetDir, &str, Vec<PipelineName>)> =
        vec![(AssetDir::Js, "**/*.js", vec![PipelineName::Script])];
    for (dir, pattern) in [
        (AssetDir::Scss, "**/*.scss"),
        (AssetDir::Sass, "**/*.sass"),
        (AssetDir::Less, "**/*.less"),
    ] {
        let mut feeds = vec![PipelineName::Style];
        if has_theme {
            feeds.push(PipelineName::Theme);
        }
        specs.push((dir, pattern, feeds));
    }
    specs.push((AssetDir::Css, "**/*.css", vec![PipelineName::Style]));
    specs.push((AssetDir::Img, "**/*", vec![PipelineName::Image]));
    specs.push((AssetDir::Lib, "**/*", vec![PipelineName::Library]));

    specs
        .into_iter()
        .filter_map(|(dir, pattern, feeds)| {
            let pipelines: Vec<PipelineName> = feeds
                .into_iter()
                .filter(|name| pipelines.get(*name).is_some())
                .collect();
            if pipelines.is_empty() {
                return None;
            }
            let pattern = glob::Pattern::new(pattern).ok()?;
            Some(WatchBinding {
                base: absolute(paths.source(dir)),
                pattern,
                pipelines,
            })
        })
        .collect()
}

/// Pipelines fed by a changed path, deduplicated in binding order
pub fn route(bindings: &[WatchBinding], path: &Path) -> Vec<PipelineName> {
    let mut matched = Vec::new();
    for binding in bindings.iter().filter(|b| b.matches(path)) {
        for name in &binding.pipelines {
            if !matched.contains(name) {
                matched.push(*name);
            }
        }
    }
    matched
}

/// A stream of changed paths plus whatever keeps it alive
pub struct ChangeStream {
    receiver: mpsc::UnboundedReceiver<PathBuf>,
    guard: Option<Box<dyn Any + Send>>,
}

/// Where change notifications come from
pub trait ChangeSource {
    fn open(self, roots: &[PathBuf]) -> Result<ChangeStream, WatchError>;
}

/// File-system changes, one debounced watcher per existing root
#[derive(Debug, Clone, Copy)]
pub struct FsEventSource {
    debounce: Duration,
}

impl FsEventSource {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }
}

impl ChangeSource for FsEventSource {
    fn open(self, roots: &[PathBuf]) -> Result<ChangeStream, WatchError> {
        let (tx, receiver) = mpsc::unbounded_channel();
        let mut debouncers = Vec::new();

        for root in roots {
            if !root.is_dir() {
                debug!("Not watching missing directory {}", root.display());
                continue;
            }
            let tx = tx.clone();
            let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
                match result {
                    Ok(events) => {
                        for event in events {
                            if matches!(event.kind, DebouncedEventKind::Any) {
                                let _ = tx.send(event.path);
                            }
                        }
                    }
                    Err(e) => warn!("File watcher error: {}", e),
                }
            })
            .map_err(WatchError::Init)?;

            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|source| WatchError::WatchPath {
                    path: root.clone(),
                    source,
                })?;
            debug!("Watching {}", root.display());
            debouncers.push(debouncer);
        }

        Ok(ChangeStream {
            receiver,
            guard: Some(Box::new(debouncers)),
        })
    }
}

/// Changes pushed through a channel
#[derive(Debug)]
pub struct ChannelEventSource {
    receiver: mpsc::UnboundedReceiver<PathBuf>,
}

impl ChannelEventSource {
    pub fn new() -> (mpsc::UnboundedSender<PathBuf>, Self) {
        let (tx, receiver) = mpsc::unbounded_channel();
        (tx, Self { receiver })
    }
}

impl ChangeSource for ChannelEventSource {
    fn open(self, _roots: &[PathBuf]) -> Result<ChangeStream, WatchError> {
        Ok(ChangeStream {
            receiver: self.receiver,
            guard: None,
        })
    }
}

/// Re-runs a single pipeline
#[async_trait]
pub trait Rebuild: Send + Sync {
    /// Returns whether the run succeeded
    async fn rebuild(&self, pipeline: PipelineName) -> bool;
}

#[derive(Debug, Default)]
struct Slot {
    running: bool,
    pending: bool,
}

/// Serializes reruns per pipeline
#[derive(Clone)]
pub struct RerunQueue {
    rebuild: Arc<dyn Rebuild>,
    reload: Arc<dyn LiveReload>,
    events: EventSink,
    slots: Arc<Mutex<HashMap<PipelineName, Slot>>>,
}

impl RerunQueue {
    pub fn new(rebuild: Arc<dyn Rebuild>, reload: Arc<dyn LiveReload>, events: EventSink) -> Self {
        Self {
            rebuild,
            reload,
            events,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request a run of `pipeline`.
    ///
    /// Starts a run when the pipeline is idle and returns its handle. While a
    /// run is in flight the request only marks the pipeline pending and `None`
    /// is returned; the in-flight task picks the pending run up when it ends.
    pub async fn trigger(&self, pipeline: PipelineName) -> Option<JoinHandle<()>> {
        {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(pipeline).or_default();
            if slot.running {
                debug!("{} already running; queued one more run", pipeline);
                slot.pending = true;
                return None;
            }
            slot.running = true;
        }

        let queue = self.clone();
        Some(tokio::spawn(async move { queue.drain(pipeline).await }))
    }

    async fn drain(&self, pipeline: PipelineName) {
        loop {
            let succeeded = self.rebuild.rebuild(pipeline).await;
            if succeeded {
                let scope = ReloadScope::for_pipeline(pipeline);
                self.events.emit(BuildEvent::ReloadRequested { pipeline, scope });
                self.reload.notify(scope);
            }

            let mut slots = self.slots.lock().await;
            let slot = slots.entry(pipeline).or_default();
            if slot.pending {
                slot.pending = false;
                continue;
            }
            slot.running = false;
            return;
        }
    }

    pub async fn is_idle(&self) -> bool {
        self.slots.lock().await.values().all(|s| !s.running)
    }
}

/// Handle for a running watch; cancel to stop routing changes
pub struct Subscription {
    task: JoinHandle<()>,
    _guard: Option<Box<dyn Any + Send>>,
}

impl Subscription {
    pub fn cancel(self) {
        self.task.abort();
        info!("Stopped watching");
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Routes changes to reruns
pub struct Watcher {
    bindings: Vec<WatchBinding>,
    queue: RerunQueue,
    events: EventSink,
}

impl Watcher {
    pub fn new(bindings: Vec<WatchBinding>, queue: RerunQueue, events: EventSink) -> Self {
        Self {
            bindings,
            queue,
            events,
        }
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Distinct binding bases
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for binding in &self.bindings {
            if !roots.contains(&binding.base) {
                roots.push(binding.base.clone());
            }
        }
        roots
    }

    pub fn start<S: ChangeSource>(self, source: S) -> Result<Subscription, WatchError> {
        let roots = self.roots();
        let ChangeStream {
            mut receiver,
            guard,
        } = source.open(&roots)?;

        info!("Watching {} directories for changes", roots.len());
        self.events.emit(BuildEvent::WatchStarted { roots });

        let task = tokio::spawn(async move {
            while let Some(path) = receiver.recv().await {
                self.handle_change(&path).await;
            }
            debug!("Change source closed");
        });

        Ok(Subscription {
            task,
            _guard: guard,
        })
    }

    async fn handle_change(&self, path: &Path) {
        let pipelines = route(&self.bindings, path);
        if pipelines.is_empty() {
            debug!("Ignoring change to {}", path.display());
            return;
        }

        info!("Changed: {}", path.display());
        self.events.emit(BuildEvent::ChangeDetected {
            path: path.to_path_buf(),
            pipelines: pipelines.clone(),
        });
        for pipeline in pipelines {
            self.queue.trigger(pipeline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::LayoutPlanner;
    use crate::core::pipeline::PipelineRegistry;
    use crate::execution::reload::NoReload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRebuild {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
    }

    impl CountingRebuild {
        fn new(delay: Duration) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl Rebuild for CountingRebuild {
        async fn rebuild(&self, _pipeline: PipelineName) -> bool {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn config_in(root: &Path) -> BuildConfig {
        BuildConfig {
            src_folder: root.join("src"),
            dist_folder: root.join("dist"),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_routing_by_category() {
        let config = config_in(Path::new("/p"));
        let bindings = watch_bindings(&config, &PipelineRegistry::build(&config));

        assert_eq!(route(&bindings, Path::new("/p/src/js/app.js")), vec![PipelineName::Script]);
        assert_eq!(
            route(&bindings, Path::new("/p/src/js/nested/x.js")),
            vec![PipelineName::Script]
        );
        assert_eq!(route(&bindings, Path::new("/p/src/scss/a.scss")), vec![PipelineName::Style]);
        assert_eq!(route(&bindings, Path::new("/p/src/img/a/b.png")), vec![PipelineName::Image]);
        assert_eq!(route(&bindings, Path::new("/p/src/lib/x.js")), vec![PipelineName::Library]);
        assert!(route(&bindings, Path::new("/p/src/js/notes.txt")).is_empty());
        assert!(route(&bindings, Path::new("/p/README.md")).is_empty());
    }

    #[test]
    fn test_dialect_changes_feed_theme() {
        let mut config = config_in(Path::new("/p"));
        config.sass.enabled = true;
        config.themeroller.enabled = true;
        config.themeroller.files = vec!["theme/*.scss".to_string()];
        let bindings = watch_bindings(&config, &PipelineRegistry::build(&config));

        assert_eq!(
            route(&bindings, Path::new("/p/src/scss/_vars.scss")),
            vec![PipelineName::Style, PipelineName::Theme]
        );
        assert_eq!(route(&bindings, Path::new("/p/src/css/x.css")), vec![PipelineName::Style]);
    }

    #[tokio::test]
    async fn test_burst_coalesces_without_overlap() {
        let rebuild = Arc::new(CountingRebuild::new(Duration::from_millis(50)));
        let queue = RerunQueue::new(rebuild.clone(), Arc::new(NoReload), EventSink::default());

        let first = queue.trigger(PipelineName::Style).await;
        assert!(first.is_some());
        for _ in 0..10 {
            assert!(queue.trigger(PipelineName::Style).await.is_none());
        }
        first.unwrap().await.unwrap();

        let runs = rebuild.runs.load(Ordering::SeqCst);
        assert!((1..=2).contains(&runs), "unexpected run count {runs}");
        assert_eq!(rebuild.max_active.load(Ordering::SeqCst), 1);
        assert!(queue.is_idle().await);
    }

    #[tokio::test]
    async fn test_idle_trigger_runs_once() {
        let rebuild = Arc::new(CountingRebuild::new(Duration::from_millis(1)));
        let queue = RerunQueue::new(rebuild.clone(), Arc::new(NoReload), EventSink::default());

        queue.trigger(PipelineName::Image).await.unwrap().await.unwrap();
        assert_eq!(rebuild.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watcher_routes_channel_changes() {
        let config = config_in(Path::new("/p"));
        let bindings = watch_bindings(&config, &PipelineRegistry::build(&config));
        let rebuild = Arc::new(CountingRebuild::new(Duration::from_millis(1)));
        let queue = RerunQueue::new(rebuild.clone(), Arc::new(NoReload), EventSink::default());

        let (tx, source) = ChannelEventSource::new();
        let subscription = Watcher::new(bindings, queue.clone(), EventSink::default())
            .start(source)
            .unwrap();

        tx.send(PathBuf::from("/p/unrelated.txt")).unwrap();
        tx.send(PathBuf::from("/p/src/lib/x.js")).unwrap();

        for _ in 0..100 {
            if rebuild.runs.load(Ordering::SeqCst) == 1 && queue.is_idle().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(rebuild.runs.load(Ordering::SeqCst), 1);
        assert!(subscription.is_active());
        subscription.cancel();
    }

    #[derive(Default)]
    struct RecordingRebuild {
        pipelines: std::sync::Mutex<Vec<PipelineName>>,
    }

    #[async_trait]
    impl Rebuild for RecordingRebuild {
        async fn rebuild(&self, pipeline: PipelineName) -> bool {
            self.pipelines.lock().unwrap().push(pipeline);
            true
        }
    }

    #[tokio::test]
    async fn test_file_system_changes_trigger_reruns() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        LayoutPlanner::plan(&config).ensure().unwrap();
        let bindings = watch_bindings(&config, &PipelineRegistry::build(&config));
        let rebuild = Arc::new(RecordingRebuild::default());
        let queue = RerunQueue::new(rebuild.clone(), Arc::new(NoReload), EventSink::default());

        let subscription = Watcher::new(bindings, queue, EventSink::default())
            .start(FsEventSource::new(Duration::from_millis(50)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let app = ProjectPaths::from_config(&config).source(AssetDir::Js).join("app.js");
        std::fs::write(&app, "go();").unwrap();

        for _ in 0..500 {
            if !rebuild.pipelines.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let pipelines = rebuild.pipelines.lock().unwrap().clone();
        assert!(!pipelines.is_empty(), "no rerun after writing {}", app.display());
        assert!(pipelines.iter().all(|p| *p == PipelineName::Script), "{:?}", pipelines);
        subscription.cancel();
    }
}
