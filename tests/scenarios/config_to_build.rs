//! Test: resolve a config file, then build the project it describes

use crate::helpers::*;
use frontend_boost::core::error::ConfigError;
use frontend_boost::core::layout::AssetDir;
use frontend_boost::core::{ConfigResolver, LayoutPlanner, PipelineName};
use frontend_boost::execution::{Orchestrator, SchedulingStrategy};
use serde_json::json;
use std::sync::Arc;

fn write_config(project: &Project, entry: serde_json::Value) -> std::path::PathBuf {
    let path = project.root().join("config.json");
    std::fs::write(&path, json!({ "shop": entry }).to_string()).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn test_config_file_to_artifacts() {
    let project = Project::new();
    let path = write_config(
        &project,
        json!({
            "srcFolder": project.root().join("src"),
            "distFolder": project.root().join("dist"),
            "sass": { "enabled": true, "includePath": "vendor" },
            "jsConcat": { "enabled": true, "finalName": "bundle" },
            "tools": { "sass": { "program": "cat" } }
        }),
    );

    let config = ConfigResolver::new().load(&path, "shop").unwrap();
    assert!(config.sass.enabled);
    assert!(config.minify.enabled);

    LayoutPlanner::plan(&config).ensure().unwrap();
    assert!(config.src_folder.join("scss").is_dir());
    assert!(config.src_folder.join("lib").is_dir());

    project.write(AssetDir::Scss, "main.scss", ".a { color: red; }");
    project.write(AssetDir::Js, "one.js", "one();");
    project.write(AssetDir::Js, "two.js", "two();");

    let orchestrator = Orchestrator::new(Arc::new(config), SchedulingStrategy::Parallel);
    let report = orchestrator.build().await.unwrap();
    assert!(report.is_success(), "{:?}", report.outcomes);

    assert!(project.output(AssetDir::Js, "bundle.js").is_file());
    assert!(project.output(AssetDir::Js, "bundle.min.js").is_file());
    assert!(project
        .read_output(AssetDir::Css, "main.css")
        .starts_with(".a { color: red; }"));
    assert_eq!(
        project.read_output(AssetDir::Css, "main.min.css").lines().next(),
        Some(".a{color: red}")
    );
}

#[test]
fn test_conflicting_preprocessors_write_nothing() {
    let project = Project::new();
    let path = write_config(
        &project,
        json!({
            "srcFolder": project.root().join("src"),
            "distFolder": project.root().join("dist"),
            "sass": { "enabled": true, "includePath": "a" },
            "less": { "enabled": true, "includePath": "b" }
        }),
    );

    let err = ConfigResolver::new().load(&path, "shop").unwrap_err();
    assert!(matches!(err, ConfigError::ConflictingOptions { ref project } if project == "shop"));
    assert!(!project.root().join("src").exists());
    assert!(!project.root().join("dist").exists());
}

#[tokio::test]
async fn test_defaults_fill_a_minimal_entry() {
    let project = Project::new();
    let path = write_config(
        &project,
        json!({
            "srcFolder": project.root().join("src"),
            "distFolder": project.root().join("dist")
        }),
    );

    let config = ConfigResolver::new().load(&path, "shop").unwrap();
    let orchestrator = Orchestrator::new(Arc::new(config), SchedulingStrategy::Sequential);
    assert_eq!(
        orchestrator.plan().pipelines(),
        vec![
            PipelineName::Script,
            PipelineName::Style,
            PipelineName::Image,
            PipelineName::Library
        ]
    );
    assert!(!orchestrator.plan().starts_live_reload());

    let report = orchestrator.build().await.unwrap();
    assert!(report.is_success());
    assert!(report.outcomes.iter().all(|o| o.files_processed == 0));
}
