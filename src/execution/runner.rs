//! Pipeline runner - executes the step list of one pipeline

use crate::core::error::{PipelineError, StepFailure, TransformWarning};
use crate::core::layout::ProjectPaths;
use crate::core::pipeline::{
    MinifyTarget, PipelineDefinition, PipelineName, Preprocessor, SourceBase, SourceRoot, Step,
    MIN_SUFFIX,
};
use crate::core::state::BuildOutcome;
use crate::execution::engine::{BuildEvent, EventSink};
use crate::tools::{AssetTool, ToolInput, Toolchain};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A source file an asset was built from, kept for source maps
#[derive(Debug, Clone)]
pub struct Origin {
    pub path: PathBuf,
    pub contents: Arc<Vec<u8>>,
}

/// One file flowing through a pipeline
#[derive(Debug, Clone)]
pub struct Asset {
    /// Output path, relative to the category output directory
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub origins: Vec<Origin>,
    /// Renamed by a minify branch; counted toward the minified size
    pub minified: bool,
}

impl Asset {
    fn with_extension(mut self, ext: &str) -> Self {
        self.path.set_extension(ext);
        self
    }
}

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Asset>, StepFailure>> + Send + 'a>>;

/// Insert `suffix` before the final extension: `app.css` + `.min` is `app.min.css`
pub fn insert_suffix(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match file_name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}{}{}", &file_name[..idx], suffix, &file_name[idx..]),
        _ => format!("{}{}", file_name, suffix),
    };
    path.with_file_name(renamed)
}

/// Executes pipelines against the project tree
#[derive(Clone)]
pub struct PipelineRunner {
    toolchain: Arc<Toolchain>,
    paths: ProjectPaths,
    banner: Option<Arc<str>>,
    events: EventSink,
}

impl PipelineRunner {
    pub fn new(toolchain: Arc<Toolchain>, paths: ProjectPaths) -> Self {
        Self {
            toolchain,
            paths,
            banner: None,
            events: EventSink::default(),
        }
    }

    pub fn with_banner(mut self, banner: Option<Arc<str>>) -> Self {
        self.banner = banner;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Run one pipeline to completion; failures are recorded in the outcome
    pub async fn run(&self, definition: &PipelineDefinition) -> BuildOutcome {
        let pipeline = definition.name;
        info!("Running pipeline: {}", pipeline);
        self.events.emit(BuildEvent::PipelineStarted { pipeline });

        let mut outcome = BuildOutcome::start(pipeline);
        let result = self
            .execute(definition, &mut outcome)
            .await
            .map_err(|cause| PipelineError { pipeline, cause });
        let outcome = outcome.finish(result);

        match &outcome.error {
            None => {
                info!(
                    "Pipeline {} finished: {} files, {} bytes",
                    pipeline, outcome.files_processed, outcome.total_bytes
                );
                self.events.emit(BuildEvent::PipelineCompleted {
                    pipeline,
                    files_processed: outcome.files_processed,
                    artifacts: outcome.artifacts.len(),
                    duration: outcome.duration(),
                });
            }
            Some(e) => {
                error!("{}", e);
                self.events.emit(BuildEvent::PipelineFailed {
                    pipeline,
                    error: e.cause.to_string(),
                });
            }
        }
        outcome
    }

    async fn execute(
        &self,
        definition: &PipelineDefinition,
        outcome: &mut BuildOutcome,
    ) -> Result<(), StepFailure> {
        let assets = self.collect_sources(&definition.sources).await?;
        outcome.files_processed = assets.len();

        if assets.is_empty() {
            debug!("Pipeline {} has no source files", definition.name);
            return Ok(());
        }

        self.run_steps(definition.name, &definition.steps, assets, outcome)
            .await?;
        Ok(())
    }

    fn root_base(&self, root: &SourceRoot) -> PathBuf {
        match root.base {
            SourceBase::Asset(dir) => self.paths.source(dir),
            SourceBase::WorkingDir => PathBuf::new(),
        }
    }

    /// Read every file matching the source roots, sorted per root, first match wins
    async fn collect_sources(&self, roots: &[SourceRoot]) -> Result<Vec<Asset>, StepFailure> {
        let mut seen = HashSet::new();
        let mut assets = Vec::new();

        for root in roots {
            let base = self.root_base(root);
            let pattern = if base.as_os_str().is_empty() {
                root.pattern.clone()
            } else {
                format!(
                    "{}/{}",
                    glob::Pattern::escape(&base.to_string_lossy()),
                    root.pattern
                )
            };

            let entries = glob::glob(&pattern).map_err(|e| StepFailure::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;

            let mut files = Vec::new();
            for entry in entries {
                let path = entry.map_err(|e| StepFailure::Read {
                    path: e.path().to_path_buf(),
                    source: std::io::Error::from(e),
                })?;
                if !path.is_file() {
                    continue;
                }
                let partial = path
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with('_'))
                    .unwrap_or(false);
                if root.skip_partials && partial {
                    continue;
                }
                files.push(path);
            }
            files.sort();

            for path in files {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let contents = tokio::fs::read(&path)
                    .await
                    .map_err(|source| StepFailure::Read {
                        path: path.clone(),
                        source,
                    })?;
                let relative = match root.base {
                    SourceBase::Asset(_) => path.strip_prefix(&base).unwrap_or(&path).to_path_buf(),
                    SourceBase::WorkingDir => path
                        .file_name()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| path.clone()),
                };
                debug!("Collected {}", path.display());
                assets.push(Asset {
                    path: relative,
                    origins: vec![Origin {
                        path: path.clone(),
                        contents: Arc::new(contents.clone()),
                    }],
                    contents,
                    minified: false,
                });
            }
        }

        Ok(assets)
    }

    fn run_steps<'a>(
        &'a self,
        pipeline: PipelineName,
        steps: &'a [Step],
        mut assets: Vec<Asset>,
        outcome: &'a mut BuildOutcome,
    ) -> StepFuture<'a> {
        Box::pin(async move {
            for step in steps {
                debug!("{}: {} ({} assets)", pipeline, step.label(), assets.len());
                assets = self.apply_step(pipeline, step, assets, outcome).await?;
            }
            Ok(assets)
        })
    }

    async fn apply_step(
        &self,
        pipeline: PipelineName,
        step: &Step,
        assets: Vec<Asset>,
        outcome: &mut BuildOutcome,
    ) -> Result<Vec<Asset>, StepFailure> {
        let tools = &self.toolchain;
        match step {
            Step::Lint => {
                if let Some(linter) = &tools.js_lint {
                    for asset in &assets {
                        if let Err(e) = linter.apply(&self.tool_input(asset)).await {
                            self.warn(pipeline, outcome, "lint", &asset.path, e.to_string());
                        }
                    }
                }
                Ok(assets)
            }
            Step::Banner => {
                let Some(banner) = &self.banner else {
                    return Ok(assets);
                };
                Ok(assets
                    .into_iter()
                    .map(|mut asset| {
                        let mut contents = banner.as_bytes().to_vec();
                        contents.append(&mut asset.contents);
                        asset.contents = contents;
                        asset
                    })
                    .collect())
            }
            Step::Preprocess(preprocessor) => {
                let (tool, include_path) = match preprocessor {
                    Preprocessor::Sass { include_path } => (&tools.sass, include_path),
                    Preprocessor::Less { include_path } => (&tools.less, include_path),
                    Preprocessor::Passthrough => return Ok(assets),
                };
                let mut out = Vec::with_capacity(assets.len());
                for asset in assets {
                    let input = self
                        .tool_input(&asset)
                        .with_option("include_path", include_path.as_str());
                    let contents = self.transform(step, tool.as_ref(), input).await?;
                    out.push(Asset { contents, ..asset }.with_extension("css"));
                }
                Ok(out)
            }
            Step::ScssToLess => {
                let mut out = Vec::with_capacity(assets.len());
                for asset in assets {
                    let input = self.tool_input(&asset);
                    let contents = self
                        .transform(step, tools.scss_to_less.as_ref(), input)
                        .await?;
                    out.push(Asset { contents, ..asset }.with_extension("less"));
                }
                Ok(out)
            }
            Step::Concat { file_name } => Ok(concat(assets, file_name)),
            Step::Autoprefix => self.map_fatal(step, tools.css_autoprefix.as_ref(), assets).await,
            Step::RtlMirror => self.map_fatal(step, tools.rtl.as_ref(), assets).await,
            Step::OptimizeImage(mode) => {
                let mut out = Vec::with_capacity(assets.len());
                for asset in assets {
                    let input = self.tool_input(&asset).with_option("mode", mode.as_str());
                    let contents = self
                        .transform(step, tools.image_optimize.as_ref(), input)
                        .await?;
                    out.push(Asset { contents, ..asset });
                }
                Ok(out)
            }
            Step::Minify(target) => {
                let tool = match target {
                    MinifyTarget::Script => &tools.js_minify,
                    MinifyTarget::Style => &tools.css_minify,
                };
                let mut out = Vec::with_capacity(assets.len());
                for asset in assets {
                    match tool.apply(&self.tool_input(&asset)).await {
                        Ok(contents) => out.push(Asset { contents, ..asset }),
                        Err(e) => {
                            self.warn(
                                pipeline,
                                outcome,
                                "minify",
                                &asset.path,
                                format!("{}; minified variant skipped", e),
                            );
                        }
                    }
                }
                Ok(out)
            }
            Step::Rename { suffix } => Ok(assets
                .into_iter()
                .map(|mut asset| {
                    asset.path = insert_suffix(&asset.path, suffix);
                    asset.minified |= *suffix == MIN_SUFFIX;
                    asset
                })
                .collect()),
            Step::Measure { label } => {
                self.measure(pipeline, label, &assets);
                Ok(assets)
            }
            Step::Tee(inner) => {
                let branch = self
                    .run_steps(pipeline, inner, assets.clone(), outcome)
                    .await?;
                let mut assets = assets;
                assets.extend(branch);
                Ok(assets)
            }
            Step::DropEmpty => Ok(assets
                .into_iter()
                .filter(|asset| {
                    let keep = !asset.contents.is_empty();
                    if !keep {
                        debug!("Dropping empty asset {}", asset.path.display());
                    }
                    keep
                })
                .collect()),
            Step::Emit { dir, sourcemaps } => {
                let out_dir = self.paths.output(*dir);
                for asset in &assets {
                    self.emit(&out_dir, asset, *sourcemaps, outcome).await?;
                }
                self.measure(pipeline, "emit", &assets);
                Ok(assets)
            }
        }
    }

    fn tool_input(&self, asset: &Asset) -> ToolInput {
        let path = asset
            .origins
            .first()
            .map(|o| o.path.clone())
            .unwrap_or_else(|| asset.path.clone());
        ToolInput::new(path, asset.contents.clone())
    }

    async fn transform(
        &self,
        step: &Step,
        tool: &dyn AssetTool,
        input: ToolInput,
    ) -> Result<Vec<u8>, StepFailure> {
        tool.apply(&input).await.map_err(|source| StepFailure::Tool {
            step: step.label(),
            path: input.path,
            source,
        })
    }

    async fn map_fatal(
        &self,
        step: &Step,
        tool: &dyn AssetTool,
        assets: Vec<Asset>,
    ) -> Result<Vec<Asset>, StepFailure> {
        let mut out = Vec::with_capacity(assets.len());
        for asset in assets {
            let input = self.tool_input(&asset);
            let contents = self.transform(step, tool, input).await?;
            out.push(Asset { contents, ..asset });
        }
        Ok(out)
    }

    fn warn(
        &self,
        pipeline: PipelineName,
        outcome: &mut BuildOutcome,
        step: &'static str,
        path: &Path,
        message: String,
    ) {
        let warning = TransformWarning {
            step,
            path: path.to_path_buf(),
            message,
        };
        warn!("{}: {}", pipeline, warning);
        self.events.emit(BuildEvent::TransformWarning {
            pipeline,
            warning: warning.clone(),
        });
        outcome.warnings.push(warning);
    }

    fn measure(&self, pipeline: PipelineName, stage: &'static str, assets: &[Asset]) {
        let bytes = assets.iter().map(|a| a.contents.len() as u64).sum();
        self.events.emit(BuildEvent::StageMeasured {
            pipeline,
            stage,
            files: assets.len(),
            bytes,
        });
    }

    async fn emit(
        &self,
        out_dir: &Path,
        asset: &Asset,
        sourcemaps: bool,
        outcome: &mut BuildOutcome,
    ) -> Result<(), StepFailure> {
        let target = out_dir.join(&asset.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StepFailure::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut contents = asset.contents.clone();
        let map = if sourcemaps {
            self.source_map(&target, asset)
        } else {
            None
        };
        if let Some((reference, map_path, map_body)) = &map {
            contents.extend_from_slice(reference.as_bytes());
            tokio::fs::write(map_path, map_body)
                .await
                .map_err(|source| StepFailure::Write {
                    path: map_path.clone(),
                    source,
                })?;
        }

        tokio::fs::write(&target, &contents)
            .await
            .map_err(|source| StepFailure::Write {
                path: target.clone(),
                source,
            })?;

        debug!("Wrote {} ({} bytes)", target.display(), contents.len());
        outcome.total_bytes += contents.len() as u64;
        if asset.minified {
            outcome.minified_bytes += contents.len() as u64;
        }
        outcome.artifacts.push(target);
        Ok(())
    }

    /// The reference comment, map path and map body for a script or stylesheet
    fn source_map(&self, target: &Path, asset: &Asset) -> Option<(String, PathBuf, String)> {
        let file_name = target.file_name()?.to_string_lossy().into_owned();
        let map_name = format!("{}.map", file_name);
        let reference = match target.extension()?.to_str()? {
            "js" => format!("\n//# sourceMappingURL={}\n", map_name),
            "css" => format!("\n/*# sourceMappingURL={} */\n", map_name),
            _ => return None,
        };

        let sources: Vec<String> = asset
            .origins
            .iter()
            .map(|o| {
                o.path
                    .strip_prefix(&self.paths.src)
                    .unwrap_or(&o.path)
                    .display()
                    .to_string()
            })
            .collect();
        let contents: Vec<String> = asset
            .origins
            .iter()
            .map(|o| String::from_utf8_lossy(&o.contents).into_owned())
            .collect();
        let body = serde_json::json!({
            "version": 3,
            "file": file_name,
            "sources": sources,
            "sourcesContent": contents,
            "names": [],
            "mappings": "",
        });

        Some((reference, target.with_file_name(map_name), body.to_string()))
    }
}

/// Merge every asset into one file, joined by newlines
fn concat(assets: Vec<Asset>, file_name: &str) -> Vec<Asset> {
    if assets.is_empty() {
        return assets;
    }
    let mut contents = Vec::new();
    let mut origins = Vec::new();
    for (i, mut asset) in assets.into_iter().enumerate() {
        if i > 0 {
            contents.push(b'\n');
        }
        contents.append(&mut asset.contents);
        origins.append(&mut asset.origins);
    }
    vec![Asset {
        path: PathBuf::from(file_name),
        contents,
        origins,
        minified: false,
    }]
}
