//! Test: change routing, serialized reruns and reload notification

use crate::helpers::*;
use async_trait::async_trait;
use frontend_boost::core::layout::AssetDir;
use frontend_boost::core::PipelineName;
use frontend_boost::execution::reload::ReloadError;
use frontend_boost::execution::{
    BuildEvent, ChannelEventSource, LiveReload, Orchestrator, ReloadScope, SchedulingStrategy,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Default)]
struct RecordingReload {
    scopes: Mutex<Vec<ReloadScope>>,
}

#[async_trait]
impl LiveReload for RecordingReload {
    async fn start(&self) -> Result<(), ReloadError> {
        Ok(())
    }

    fn notify(&self, scope: ReloadScope) {
        self.scopes.lock().unwrap().push(scope);
    }
}

/// Orchestrator whose events are forwarded to a channel
fn watched(project: &Project, reload: Arc<RecordingReload>) -> (Orchestrator, mpsc::UnboundedReceiver<BuildEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain())
        .with_live_reload(reload);
    orchestrator.add_event_handler(move |event| {
        let _ = tx.send(event);
    });
    (orchestrator, rx)
}

async fn next_reload(rx: &mut mpsc::UnboundedReceiver<BuildEvent>) -> (PipelineName, ReloadScope) {
    let wait = async {
        while let Some(event) = rx.recv().await {
            if let BuildEvent::ReloadRequested { pipeline, scope } = event {
                return (pipeline, scope);
            }
        }
        panic!("event stream closed");
    };
    timeout(Duration::from_secs(5), wait)
        .await
        .expect("no reload within 5s")
}

#[tokio::test]
async fn test_script_change_reruns_script_only() {
    let project = Project::new();
    let app = project.write(AssetDir::Js, "app.js", "v1();");
    project.write(AssetDir::Css, "site.css", "a { color: red; }");

    let reload = Arc::new(RecordingReload::default());
    let (orchestrator, mut rx) = watched(&project, reload.clone());
    orchestrator.build().await.unwrap();
    while rx.try_recv().is_ok() {}

    let (changes, source) = ChannelEventSource::new();
    let subscription = orchestrator.watch(source).unwrap();
    assert!(subscription.is_active());

    std::fs::write(&app, "v2();").unwrap();
    changes.send(app.clone()).unwrap();

    assert_eq!(next_reload(&mut rx).await, (PipelineName::Script, ReloadScope::Full));
    assert!(project.read_output(AssetDir::Js, "app.js").starts_with("v2();"));
    assert_eq!(*reload.scopes.lock().unwrap(), vec![ReloadScope::Full]);

    subscription.cancel();
}

#[tokio::test]
async fn test_stylesheet_change_requests_style_injection() {
    let project = Project::new();
    let site = project.write(AssetDir::Css, "site.css", "a { color: red; }");

    let reload = Arc::new(RecordingReload::default());
    let (orchestrator, mut rx) = watched(&project, reload.clone());

    let (changes, source) = ChannelEventSource::new();
    let subscription = orchestrator.watch(source).unwrap();

    // outside every category: ignored
    changes.send(project.root().join("README.md")).unwrap();
    changes.send(site).unwrap();

    assert_eq!(next_reload(&mut rx).await, (PipelineName::Style, ReloadScope::Styles));
    assert!(project.output(AssetDir::Css, "site.min.css").is_file());

    subscription.cancel();
}

#[tokio::test]
async fn test_failed_rerun_does_not_reload() {
    let mut project = Project::new();
    project.config.sass.enabled = true;
    project.config.sass.include_path = "vendor".to_string();
    let main = project.write(AssetDir::Scss, "main.scss", ".a {}");
    let app = project.write(AssetDir::Js, "app.js", "go();");

    let reload = Arc::new(RecordingReload::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut toolchain = test_toolchain();
    toolchain.sass = MockTool::failing("broken");
    let mut orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(toolchain)
        .with_live_reload(reload.clone());
    orchestrator.add_event_handler(move |event| {
        let _ = tx.send(event);
    });

    let (changes, source) = ChannelEventSource::new();
    let subscription = orchestrator.watch(source).unwrap();

    changes.send(main).unwrap();
    changes.send(app).unwrap();

    // the style rerun fails, the script rerun reloads
    assert_eq!(next_reload(&mut rx).await.0, PipelineName::Script);
    assert_eq!(*reload.scopes.lock().unwrap(), vec![ReloadScope::Full]);

    subscription.cancel();
}

#[tokio::test]
async fn test_watch_started_lists_category_roots() {
    let project = Project::new();
    let reload = Arc::new(RecordingReload::default());
    let (orchestrator, mut rx) = watched(&project, reload);

    let (_changes, source) = ChannelEventSource::new();
    let subscription = orchestrator.watch(source).unwrap();

    match rx.recv().await {
        Some(BuildEvent::WatchStarted { roots }) => {
            let paths = project.paths();
            assert!(roots.contains(&paths.source(AssetDir::Js)));
            assert!(roots.contains(&paths.source(AssetDir::Img)));
            assert!(roots.contains(&paths.source(AssetDir::Lib)));
        }
        other => panic!("expected WatchStarted, got {:?}", other),
    }
    subscription.cancel();
}
