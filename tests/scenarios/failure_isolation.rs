//! Test: a failing pipeline does not take the others down

use crate::helpers::*;
use frontend_boost::core::layout::AssetDir;
use frontend_boost::core::{PipelineName, StepFailure};
use frontend_boost::execution::{BuildEvent, Orchestrator, SchedulingStrategy};
use frontend_boost::tools::AssetTool;
use std::sync::{Arc, Mutex};

fn sass_project() -> Project {
    let mut project = Project::new();
    project.config.sass.enabled = true;
    project.config.sass.include_path = "vendor".to_string();
    project.write(AssetDir::Scss, "main.scss", ".a { color: red; }");
    project.write(AssetDir::Js, "app.js", "go();");
    project.write(AssetDir::Img, "logo.png", "png");
    project.write(AssetDir::Lib, "vendor.js", "lib();");
    project
}

#[tokio::test]
async fn test_failing_preprocessor_only_fails_style() {
    for strategy in [SchedulingStrategy::Sequential, SchedulingStrategy::Parallel] {
        let project = sass_project();
        let sass = MockTool::failing("Undefined variable: $brand");
        let mut toolchain = test_toolchain();
        toolchain.sass = sass.clone();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut orchestrator = Orchestrator::new(Arc::new(project.config.clone()), strategy)
            .with_toolchain(toolchain);
        orchestrator.add_event_handler(move |event| sink.lock().unwrap().push(event));

        let report = orchestrator.build().await.unwrap();

        assert_eq!(report.failed(), 1, "{:?}", strategy);
        assert_eq!(report.succeeded(), 3);
        let style = report.outcome(PipelineName::Style).unwrap();
        let error = style.error.as_ref().unwrap();
        assert!(matches!(error.cause, StepFailure::Tool { step: "preprocess", .. }));
        assert!(error.to_string().contains("Undefined variable"));
        assert_eq!(sass.calls().len(), 1);

        // the other categories still emitted
        assert!(project.output(AssetDir::Js, "app.js").is_file());
        assert!(project.output(AssetDir::Js, "app.min.js").is_file());
        assert!(project.output(AssetDir::Img, "logo.png").is_file());
        assert!(project.output(AssetDir::Lib, "vendor.js").is_file());
        assert!(project.output_files(AssetDir::Css).is_empty());

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|e| matches!(
            e,
            BuildEvent::PipelineFailed { pipeline: PipelineName::Style, .. }
        )));
        assert!(matches!(
            seen.last(),
            Some(BuildEvent::BuildFinished { succeeded: 3, failed: 1, .. })
        ));
    }
}

/// A minifier that rejects one file only drops that file's minified variant
#[tokio::test]
async fn test_minify_failure_drops_one_variant() {
    let project = Project::new();
    project.write(AssetDir::Js, "good.js", "ok();");
    project.write(AssetDir::Js, "bad.js", "syntax error (");

    let mut toolchain = test_toolchain();
    toolchain.js_minify = MockTool::new(|text| {
        if text.contains("error") {
            Err("Unexpected token".to_string())
        } else {
            Ok(text.replace(' ', ""))
        }
    });

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(toolchain);
    let report = orchestrator.build().await.unwrap();

    assert!(report.is_success());
    let script = report.outcome(PipelineName::Script).unwrap();
    assert_eq!(script.warnings.len(), 1);
    assert!(script.warnings[0].path.ends_with("bad.js"));
    assert_eq!(
        project.output_files(AssetDir::Js),
        vec![
            "bad.js",
            "bad.js.map",
            "good.js",
            "good.js.map",
            "good.min.js",
            "good.min.js.map"
        ]
    );
}

/// A lint finding is reported and the asset is still written unchanged
#[tokio::test]
async fn test_lint_findings_are_warnings() {
    let project = Project::new();
    project.write(AssetDir::Js, "app.js", "var unused;");

    let linter = MockTool::failing("'unused' is defined but never used");
    let mut toolchain = test_toolchain();
    toolchain.js_lint = Some(linter.clone() as Arc<dyn AssetTool>);

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(toolchain);
    let report = orchestrator.build().await.unwrap();

    let script = report.outcome(PipelineName::Script).unwrap();
    assert!(script.succeeded());
    assert_eq!(script.warnings[0].step, "lint");
    assert_eq!(linter.calls().len(), 1);
    assert!(project.read_output(AssetDir::Js, "app.js").starts_with("var unused;"));
}
