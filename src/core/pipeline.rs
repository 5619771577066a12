//! Pipeline definitions: the fixed set of asset pipelines and their steps
//!
//! Every conditional branch (preprocessor, concatenation, minification, RTL,
//! image optimization) is decided here, once per configuration. The result is
//! a plain step list that can be inspected without touching the filesystem.

use crate::core::config::{BuildConfig, OptimizationMode, StyleDialect};
use crate::core::layout::AssetDir;
use serde::Serialize;
use std::fmt;

/// Filename suffix of minified artifacts
pub const MIN_SUFFIX: &str = ".min";

/// Filename suffix of right-to-left artifacts
pub const RTL_SUFFIX: &str = ".rtl";

/// The named pipelines, in full-build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineName {
    Theme,
    Script,
    Style,
    Image,
    Library,
}

impl PipelineName {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineName::Theme => "theme",
            PipelineName::Script => "script",
            PipelineName::Style => "style",
            PipelineName::Image => "image",
            PipelineName::Library => "library",
        }
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a source pattern is anchored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBase {
    /// A subdirectory of the source tree
    Asset(AssetDir),
    /// The process working directory (theme file lists)
    WorkingDir,
}

/// One glob of input files for a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub base: SourceBase,
    pub pattern: String,
    /// Skip `_partial` files the preprocessor only imports
    pub skip_partials: bool,
}

impl SourceRoot {
    fn asset(dir: AssetDir, pattern: &str) -> Self {
        Self {
            base: SourceBase::Asset(dir),
            pattern: pattern.to_string(),
            skip_partials: false,
        }
    }

    fn partials_skipped(mut self) -> Self {
        self.skip_partials = true;
        self
    }
}

/// Stylesheet preprocessing mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preprocessor {
    Sass { include_path: String },
    Less { include_path: String },
    /// Plain CSS goes through untouched
    Passthrough,
}

/// Which minifier a minify step uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyTarget {
    Script,
    Style,
}

/// A single step of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Report lint findings as warnings; never alters the assets
    Lint,
    /// Prepend the package banner (no-op when no banner was loaded)
    Banner,
    Preprocess(Preprocessor),
    ScssToLess,
    /// Merge every asset into one named file
    Concat { file_name: String },
    Autoprefix,
    /// Best-effort: a file that fails to minify is dropped from the set
    Minify(MinifyTarget),
    /// Insert a suffix before the final extension
    Rename { suffix: &'static str },
    /// Publish file count and size telemetry
    Measure { label: &'static str },
    /// Run nested steps on a copy of the set and append their output
    Tee(Vec<Step>),
    RtlMirror,
    OptimizeImage(OptimizationMode),
    /// Drop zero-byte assets
    DropEmpty,
    /// Write the current set under the output directory
    Emit { dir: AssetDir, sourcemaps: bool },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Lint => "lint",
            Step::Banner => "banner",
            Step::Preprocess(_) => "preprocess",
            Step::ScssToLess => "scss-to-less",
            Step::Concat { .. } => "concat",
            Step::Autoprefix => "autoprefix",
            Step::Minify(_) => "minify",
            Step::Rename { .. } => "rename",
            Step::Measure { .. } => "measure",
            Step::Tee(_) => "tee",
            Step::RtlMirror => "rtl",
            Step::OptimizeImage(_) => "optimize",
            Step::DropEmpty => "drop-empty",
            Step::Emit { .. } => "emit",
        }
    }
}

/// A pipeline: its inputs and its ordered steps
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: PipelineName,
    pub sources: Vec<SourceRoot>,
    pub steps: Vec<Step>,
}

impl PipelineDefinition {
    /// Depth-first walk over every step, including nested tee steps
    pub fn flatten(&self) -> Vec<&Step> {
        fn walk<'a>(steps: &'a [Step], out: &mut Vec<&'a Step>) {
            for step in steps {
                out.push(step);
                if let Step::Tee(inner) = step {
                    walk(inner, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.steps, &mut out);
        out
    }
}

/// The pipelines of one configuration, in build order
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSet {
    definitions: Vec<PipelineDefinition>,
}

impl PipelineSet {
    pub fn get(&self, name: PipelineName) -> Option<&PipelineDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> Vec<PipelineName> {
        self.definitions.iter().map(|d| d.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelineDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Builds the pipeline set for a configuration
pub struct PipelineRegistry;

impl PipelineRegistry {
    pub fn build(config: &BuildConfig) -> PipelineSet {
        let mut definitions = Vec::new();
        if config.theme_enabled() {
            definitions.push(Self::theme(config));
        }
        definitions.push(Self::script(config));
        definitions.push(Self::style(config));
        definitions.push(Self::image(config));
        definitions.push(Self::library());
        PipelineSet { definitions }
    }

    fn script(config: &BuildConfig) -> PipelineDefinition {
        let mut steps = vec![Step::Lint];
        if config.header.enabled {
            steps.push(Step::Banner);
        }
        if config.js_concat.enabled {
            steps.push(Step::Concat {
                file_name: format!("{}.js", config.js_concat.final_name),
            });
        }
        steps.push(Step::Measure { label: "js" });
        steps.push(Step::Emit {
            dir: AssetDir::Js,
            sourcemaps: true,
        });
        if config.minify.enabled {
            steps.extend([
                Step::Minify(MinifyTarget::Script),
                Step::Rename { suffix: MIN_SUFFIX },
                Step::Measure { label: "js.min" },
                Step::Emit {
                    dir: AssetDir::Js,
                    sourcemaps: true,
                },
            ]);
        }

        PipelineDefinition {
            name: PipelineName::Script,
            sources: vec![SourceRoot::asset(AssetDir::Js, "*.js")],
            steps,
        }
    }

    fn style(config: &BuildConfig) -> PipelineDefinition {
        let (sources, preprocessor) = match config.style_dialect() {
            StyleDialect::Sass => (
                vec![
                    SourceRoot::asset(AssetDir::Scss, "*.scss").partials_skipped(),
                    SourceRoot::asset(AssetDir::Sass, "*.sass").partials_skipped(),
                ],
                Preprocessor::Sass {
                    include_path: config.sass.include_path.clone(),
                },
            ),
            StyleDialect::Less => (
                vec![SourceRoot::asset(AssetDir::Less, "*.less")],
                Preprocessor::Less {
                    include_path: config.less.include_path.clone(),
                },
            ),
            StyleDialect::Css => (
                vec![SourceRoot::asset(AssetDir::Css, "*.css")],
                Preprocessor::Passthrough,
            ),
        };

        let mut steps = Vec::new();
        if config.header.enabled {
            steps.push(Step::Banner);
        }
        steps.push(Step::Preprocess(preprocessor));
        if config.css_concat.enabled {
            steps.push(Step::Concat {
                file_name: format!("{}.css", config.css_concat.final_name),
            });
        }
        steps.push(Step::Autoprefix);
        steps.push(Step::Measure { label: "css" });

        let rtl = || Step::Tee(vec![Step::RtlMirror, Step::Rename { suffix: RTL_SUFFIX }]);
        if config.minify.enabled {
            let mut minified = vec![
                Step::Minify(MinifyTarget::Style),
                Step::Rename { suffix: MIN_SUFFIX },
                Step::Measure { label: "css.min" },
            ];
            if config.rtl.enabled {
                minified.push(rtl());
            }
            steps.push(Step::Tee(minified));
        } else if config.rtl.enabled {
            steps.push(rtl());
        }

        steps.push(Step::DropEmpty);
        steps.push(Step::Emit {
            dir: AssetDir::Css,
            sourcemaps: true,
        });

        PipelineDefinition {
            name: PipelineName::Style,
            sources,
            steps,
        }
    }

    fn image(config: &BuildConfig) -> PipelineDefinition {
        let mut steps = Vec::new();
        if config.image_optimization.enabled {
            steps.push(Step::OptimizeImage(config.image_optimization.mode));
        }
        steps.push(Step::Measure { label: "img" });
        steps.push(Step::Emit {
            dir: AssetDir::Img,
            sourcemaps: false,
        });

        PipelineDefinition {
            name: PipelineName::Image,
            sources: vec![SourceRoot::asset(AssetDir::Img, "**/*")],
            steps,
        }
    }

    fn library() -> PipelineDefinition {
        PipelineDefinition {
            name: PipelineName::Library,
            sources: vec![SourceRoot::asset(AssetDir::Lib, "**/*")],
            steps: vec![
                Step::Measure { label: "lib" },
                Step::Emit {
                    dir: AssetDir::Lib,
                    sourcemaps: false,
                },
            ],
        }
    }

    fn theme(config: &BuildConfig) -> PipelineDefinition {
        let mut steps = Vec::new();
        if config.style_dialect() == StyleDialect::Sass {
            steps.push(Step::ScssToLess);
        }
        steps.push(Step::Concat {
            file_name: format!("{}.less", config.themeroller.final_name),
        });
        steps.push(Step::Emit {
            dir: AssetDir::Less,
            sourcemaps: false,
        });

        PipelineDefinition {
            name: PipelineName::Theme,
            sources: config
                .themeroller
                .files
                .iter()
                .map(|pattern| SourceRoot {
                    base: SourceBase::WorkingDir,
                    pattern: pattern.clone(),
                    skip_partials: false,
                })
                .collect(),
            steps,
        }
    }
}
