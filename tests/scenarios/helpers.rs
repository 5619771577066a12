//! Shared fixtures for scenario tests

use async_trait::async_trait;
use frontend_boost::core::layout::{AssetDir, ProjectPaths};
use frontend_boost::core::BuildConfig;
use frontend_boost::tools::{AssetTool, ToolError, ToolInput, Toolchain};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type Transform = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Tool double that applies a closure to the input text and records every call
pub struct MockTool {
    transform: Transform,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockTool {
    pub fn new<F>(transform: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            transform: Box::new(transform),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Wraps the input so the output shows which tool touched it
    pub fn tagging(tag: &'static str) -> Arc<Self> {
        Self::new(move |text| Ok(format!("/* {tag} */{text}")))
    }

    pub fn failing(message: &'static str) -> Arc<Self> {
        Self::new(move |_| Err(message.to_string()))
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetTool for MockTool {
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        self.calls.lock().unwrap().push(input.path.clone());
        let text = input.text()?;
        (self.transform)(text)
            .map(String::into_bytes)
            .map_err(|message| ToolError::ExitStatus {
                program: "mock".to_string(),
                code: 1,
                message,
            })
    }
}

/// A throwaway project rooted in a temp directory
pub struct Project {
    pub dir: TempDir,
    pub config: BuildConfig,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            src_folder: dir.path().join("src"),
            dist_folder: dir.path().join("dist"),
            ..BuildConfig::default()
        };
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::from_config(&self.config)
    }

    pub fn write(&self, dir: AssetDir, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.paths().source(dir).join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn output(&self, dir: AssetDir, relative: &str) -> PathBuf {
        self.paths().output(dir).join(relative)
    }

    pub fn read_output(&self, dir: AssetDir, relative: &str) -> String {
        std::fs::read_to_string(self.output(dir, relative)).unwrap()
    }

    /// Sorted file names directly under an output category
    pub fn output_files(&self, dir: AssetDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.paths().output(dir))
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().into_string().unwrap())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Built-in tools with stand-ins for the preprocessors
pub fn test_toolchain() -> Toolchain {
    let mut toolchain = Toolchain::builtin();
    toolchain.sass = MockTool::tagging("sass");
    toolchain.less = MockTool::tagging("less");
    toolchain
}
