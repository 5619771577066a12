//! External transform tools
//!
//! Every transform a pipeline step needs (preprocessors, linters, minifiers,
//! optimizers) is reached through [`AssetTool`]. The default implementations
//! run a configured command as a subprocess; a few small text transforms are
//! built in.

pub mod builtin;
pub mod subprocess;

use crate::core::config::{ToolCommand, ToolsConfig};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use builtin::{BidiMirror, CssMinifier, Passthrough, ScssToLess, Unavailable};
pub use subprocess::CommandTool;

/// Error types for tool invocations
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {message}")]
    ExitStatus {
        program: String,
        code: i32,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

/// One file handed to a tool
#[derive(Debug, Clone)]
pub struct ToolInput {
    /// Path of the original source file (or the virtual path after renames)
    pub path: PathBuf,

    pub contents: Vec<u8>,

    /// Step options, available to command arguments as `{{ key }}`
    pub options: BTreeMap<String, String>,
}

impl ToolInput {
    pub fn new(path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Contents as UTF-8 text, for the built-in text transforms
    pub fn text(&self) -> Result<&str, ToolError> {
        std::str::from_utf8(&self.contents).map_err(|e| {
            ToolError::Invalid(format!("{} is not UTF-8: {}", self.path.display(), e))
        })
    }
}

/// Trait for transform execution - allows for different implementations
#[async_trait]
pub trait AssetTool: Send + Sync {
    /// Transform one file, returning the new contents
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError>;
}

/// The tool used for each transform a pipeline can request
#[derive(Clone)]
pub struct Toolchain {
    pub sass: Arc<dyn AssetTool>,
    pub less: Arc<dyn AssetTool>,
    /// Linting is skipped when no linter is configured
    pub js_lint: Option<Arc<dyn AssetTool>>,
    pub js_minify: Arc<dyn AssetTool>,
    pub css_autoprefix: Arc<dyn AssetTool>,
    pub css_minify: Arc<dyn AssetTool>,
    pub image_optimize: Arc<dyn AssetTool>,
    pub rtl: Arc<dyn AssetTool>,
    pub scss_to_less: Arc<dyn AssetTool>,
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("js_lint", &self.js_lint.is_some())
            .finish_non_exhaustive()
    }
}

fn command(tool: &Option<ToolCommand>) -> Option<Arc<dyn AssetTool>> {
    tool.as_ref()
        .map(|c| Arc::new(CommandTool::from_command(c)) as Arc<dyn AssetTool>)
}

impl Toolchain {
    /// Built-in tools only: no preprocessors, no linter, pass-through minify
    pub fn builtin() -> Self {
        Self {
            sass: Arc::new(Unavailable::new("sass")),
            less: Arc::new(Unavailable::new("less")),
            js_lint: None,
            js_minify: Arc::new(Passthrough),
            css_autoprefix: Arc::new(Passthrough),
            css_minify: Arc::new(CssMinifier::new()),
            image_optimize: Arc::new(Passthrough),
            rtl: Arc::new(BidiMirror::new()),
            scss_to_less: Arc::new(ScssToLess::new()),
        }
    }

    /// Configured commands, falling back to the built-ins for unset tools
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let builtin = Self::builtin();
        Self {
            sass: command(&tools.sass).unwrap_or(builtin.sass),
            less: command(&tools.less).unwrap_or(builtin.less),
            js_lint: command(&tools.js_lint),
            js_minify: command(&tools.js_minify).unwrap_or(builtin.js_minify),
            css_autoprefix: command(&tools.css_autoprefix).unwrap_or(builtin.css_autoprefix),
            css_minify: command(&tools.css_minify).unwrap_or(builtin.css_minify),
            image_optimize: command(&tools.image_optimize).unwrap_or(builtin.image_optimize),
            rtl: command(&tools.rtl).unwrap_or(builtin.rtl),
            scss_to_less: builtin.scss_to_less,
        }
    }
}
