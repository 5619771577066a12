//! Test: artifacts written by a full build

use crate::helpers::*;
use frontend_boost::core::layout::AssetDir;
use frontend_boost::core::PipelineName;
use frontend_boost::execution::{Orchestrator, SchedulingStrategy};
use std::sync::Arc;

/// Two scripts concatenated into app.js, plus the minified variant, each with a map
#[tokio::test]
async fn test_script_concat_and_minify() {
    let mut project = Project::new();
    project.config.sass.enabled = true;
    project.config.sass.include_path = "vendor".to_string();
    project.config.js_concat.enabled = true;
    project.config.js_concat.final_name = "app".to_string();

    project.write(AssetDir::Js, "a.js", "var a = 1;");
    project.write(AssetDir::Js, "b.js", "var b = 2;");

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain());
    let report = orchestrator.build().await.unwrap();

    assert!(report.is_success());
    assert_eq!(
        project.output_files(AssetDir::Js),
        vec!["app.js", "app.js.map", "app.min.js", "app.min.js.map"]
    );

    let app = project.read_output(AssetDir::Js, "app.js");
    assert!(app.starts_with("var a = 1;\nvar b = 2;"));
    assert!(app.contains("//# sourceMappingURL=app.js.map"));
    let min = project.read_output(AssetDir::Js, "app.min.js");
    assert!(min.contains("//# sourceMappingURL=app.min.js.map"));

    let map: serde_json::Value =
        serde_json::from_str(&project.read_output(AssetDir::Js, "app.js.map")).unwrap();
    assert_eq!(map["sources"].as_array().unwrap().len(), 2);

    let script = report.outcome(PipelineName::Script).unwrap();
    assert_eq!(script.files_processed, 2);
    assert_eq!(script.artifacts.len(), 2);
}

/// Sass with RTL: unminified, minified and RTL-minified stylesheets
#[tokio::test]
async fn test_style_sass_with_rtl() {
    let mut project = Project::new();
    project.config.sass.enabled = true;
    project.config.sass.include_path = "vendor".to_string();
    project.config.rtl.enabled = true;

    project.write(AssetDir::Scss, "main.scss", ".nav { float: left; padding: 1px 2px 3px 4px; }");
    project.write(AssetDir::Scss, "_mixins.scss", "@mixin x {}");

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Sequential)
        .with_toolchain(test_toolchain());
    let report = orchestrator.build().await.unwrap();

    let style = report.outcome(PipelineName::Style).unwrap();
    assert!(style.succeeded(), "{:?}", style.error);
    assert_eq!(style.files_processed, 1);

    let written: Vec<String> = style
        .artifacts
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written, vec!["main.css", "main.min.css", "main.min.rtl.css"]);

    let min = project.read_output(AssetDir::Css, "main.min.css");
    let rtl = project.read_output(AssetDir::Css, "main.min.rtl.css");
    assert_ne!(min, rtl);
    assert!(rtl.contains("float:right") || rtl.contains("float: right"));
    assert!(rtl.contains("1px 4px 3px 2px"));
    assert!(project.read_output(AssetDir::Css, "main.css").starts_with("/* sass */"));
}

/// Without minification the RTL variant is derived from the unminified sheet
#[tokio::test]
async fn test_style_rtl_without_minify() {
    let mut project = Project::new();
    project.config.rtl.enabled = true;
    project.config.minify.enabled = false;
    project.write(AssetDir::Css, "site.css", "p { text-align: left; }");

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain());
    orchestrator.build().await.unwrap();

    assert_eq!(
        project.output_files(AssetDir::Css),
        vec!["site.css", "site.css.map", "site.rtl.css", "site.rtl.css.map"]
    );
    assert!(project
        .read_output(AssetDir::Css, "site.rtl.css")
        .starts_with("p { text-align: right; }"));
}

/// Images are copied byte for byte, subdirectories included
#[tokio::test]
async fn test_image_copy_preserves_bytes_and_subpaths() {
    let project = Project::new();
    let logo: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0x00, 0xff, 0x10];
    project.write(AssetDir::Img, "logo.png", &logo);
    project.write(AssetDir::Img, "icons/small/star.svg", "<svg/>");

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain());
    let report = orchestrator.build().await.unwrap();

    assert_eq!(report.outcome(PipelineName::Image).unwrap().files_processed, 2);
    assert_eq!(std::fs::read(project.output(AssetDir::Img, "logo.png")).unwrap(), logo);
    assert_eq!(
        std::fs::read(project.output(AssetDir::Img, "icons/small/star.svg")).unwrap(),
        b"<svg/>"
    );
    assert!(!project.output(AssetDir::Img, "logo.png.map").exists());
}

/// No library files on disk: zero processed, no error
#[tokio::test]
async fn test_library_without_files() {
    let project = Project::new();
    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain());
    let report = orchestrator.build().await.unwrap();

    let library = report.outcome(PipelineName::Library).unwrap();
    assert!(library.succeeded());
    assert!(library.error.is_none());
    assert_eq!(library.files_processed, 0);
}

/// The theme pipeline converts SCSS sources into one LESS file
#[tokio::test]
async fn test_theme_from_scss() {
    let mut project = Project::new();
    project.config.sass.enabled = true;
    project.config.sass.include_path = "vendor".to_string();
    project.config.themeroller.enabled = true;
    let theme_dir = project.root().join("theme");
    std::fs::create_dir_all(&theme_dir).unwrap();
    std::fs::write(theme_dir.join("colors.scss"), "$brand: red !default;").unwrap();
    std::fs::write(theme_dir.join("buttons.scss"), ".btn { color: $brand; }").unwrap();
    project.config.themeroller.files = vec![format!("{}/*.scss", theme_dir.display())];

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain());
    let report = orchestrator.build().await.unwrap();

    assert_eq!(orchestrator.plan().pipelines()[0], PipelineName::Theme);
    assert!(report.outcome(PipelineName::Theme).unwrap().succeeded());
    let theme = project.read_output(AssetDir::Less, "theme.less");
    assert_eq!(theme, ".btn { color: @brand; }\n@brand: red;");
}

/// Banner text is prepended to scripts when headers are enabled
#[tokio::test]
async fn test_banner_prepended() {
    let project = Project::new();
    project.write(AssetDir::Js, "app.js", "run();");

    let orchestrator = Orchestrator::new(Arc::new(project.config.clone()), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain())
        .with_banner(Some("/*! shop v1 */\n".to_string()));
    let mut config = project.config.clone();
    config.header.enabled = true;
    let orchestrator_with_header = Orchestrator::new(Arc::new(config), SchedulingStrategy::Parallel)
        .with_toolchain(test_toolchain())
        .with_banner(Some("/*! shop v1 */\n".to_string()));

    // headers disabled: the banner step is not planned
    orchestrator.build().await.unwrap();
    assert!(project.read_output(AssetDir::Js, "app.js").starts_with("run();"));

    orchestrator_with_header.build().await.unwrap();
    assert!(project
        .read_output(AssetDir::Js, "app.js")
        .starts_with("/*! shop v1 */\nrun();"));
}
