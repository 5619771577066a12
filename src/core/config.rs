//! Project configuration: typed settings, built-in defaults and resolution
//!
//! A config file maps project names to override objects. Resolving a project
//! deep-merges its entry over the built-in defaults and validates the result.

use crate::core::error::{ConfigError, SchemaViolation};
use crate::core::schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// On-disk format of the user config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension (JSON unless `.yml`/`.yaml`)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// The resolved, immutable configuration of one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// Root of the source tree
    pub src_folder: PathBuf,

    /// Root of the output tree (deleted on every full build)
    pub dist_folder: PathBuf,

    /// Application URL proxied by the live-reload server
    #[serde(rename = "appURL")]
    pub app_url: String,

    pub sass: PreprocessorConfig,
    pub less: PreprocessorConfig,
    pub js_concat: ConcatConfig,
    pub css_concat: ConcatConfig,

    /// Emit `.min` variants for scripts and styles
    pub minify: Toggle,

    /// Banner injection from package metadata
    pub header: HeaderConfig,

    /// Live-reload dev server
    pub browsersync: LiveReloadConfig,

    /// Right-to-left stylesheet variants
    pub rtl: Toggle,

    pub image_optimization: ImageOptimizationConfig,

    /// Aggregated theme stylesheet
    pub themeroller: ThemeConfig,

    pub watch: WatchConfig,

    /// External commands backing each transform
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreprocessorConfig {
    pub enabled: bool,
    pub include_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConcatConfig {
    pub enabled: bool,
    pub final_name: String,
}

impl Default for ConcatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            final_name: "app".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderConfig {
    pub enabled: bool,
    /// Directory containing `package.json`
    pub package_json_path: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            package_json_path: "./".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveReloadConfig {
    pub enabled: bool,
    pub port: u16,
    /// Show the in-browser notification on reload
    pub notify: bool,
    pub ui_port: u16,
    pub weinre_port: u16,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 3000,
            notify: true,
            ui_port: 3001,
            weinre_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    #[default]
    Lossless,
    Lossy,
}

impl OptimizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationMode::Lossless => "lossless",
            OptimizationMode::Lossy => "lossy",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOptimizationConfig {
    pub enabled: bool,
    pub mode: OptimizationMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeConfig {
    pub enabled: bool,
    /// Glob patterns, relative to the working directory
    pub files: Vec<String>,
    pub final_name: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            files: Vec::new(),
            final_name: "theme".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

/// An external command; `args` may use `{{ file }}`, `{{ dir }}` and `{{ include_path }}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Command overrides per transform. Unset tools fall back to built-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    pub sass: Option<ToolCommand>,
    pub less: Option<ToolCommand>,
    pub js_lint: Option<ToolCommand>,
    pub js_minify: Option<ToolCommand>,
    pub css_autoprefix: Option<ToolCommand>,
    pub css_minify: Option<ToolCommand>,
    pub image_optimize: Option<ToolCommand>,
    pub rtl: Option<ToolCommand>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sass: Some(ToolCommand::new(
                "sass",
                &[
                    "--stdin",
                    "--no-source-map",
                    "--load-path={{ include_path }}",
                    "--load-path={{ dir }}",
                ],
            )),
            less: Some(ToolCommand::new(
                "lessc",
                &["--include-path={{ include_path }}:{{ dir }}", "-"],
            )),
            js_lint: None,
            js_minify: None,
            css_autoprefix: None,
            css_minify: None,
            image_optimize: None,
            rtl: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src_folder: PathBuf::from("src"),
            dist_folder: PathBuf::from("dist"),
            app_url: "http://localhost:8080".to_string(),
            sass: PreprocessorConfig::default(),
            less: PreprocessorConfig::default(),
            js_concat: ConcatConfig::default(),
            css_concat: ConcatConfig::default(),
            minify: Toggle { enabled: true },
            header: HeaderConfig::default(),
            browsersync: LiveReloadConfig::default(),
            rtl: Toggle::default(),
            image_optimization: ImageOptimizationConfig::default(),
            themeroller: ThemeConfig::default(),
            watch: WatchConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Stylesheet source dialect selected by the preprocessor flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleDialect {
    Sass,
    Less,
    Css,
}

impl BuildConfig {
    /// The built-in defaults as a JSON tree, the base of every merge
    pub fn default_value() -> Value {
        serde_json::to_value(BuildConfig::default()).unwrap_or(Value::Null)
    }

    pub fn style_dialect(&self) -> StyleDialect {
        if self.sass.enabled {
            StyleDialect::Sass
        } else if self.less.enabled {
            StyleDialect::Less
        } else {
            StyleDialect::Css
        }
    }

    /// Whether the theme pipeline takes part in the build
    pub fn theme_enabled(&self) -> bool {
        self.themeroller.enabled && self.style_dialect() != StyleDialect::Css
    }

    /// Validate the merged configuration: conflicts, then required fields, then layout
    pub fn validate(&self, project: &str) -> Result<(), ConfigError> {
        if self.sass.enabled && self.less.enabled {
            return Err(ConfigError::ConflictingOptions {
                project: project.to_string(),
            });
        }

        let mut violations = Vec::new();
        let mut require = |enabled: bool, path: &str, value: &str| {
            if enabled && value.trim().is_empty() {
                violations.push(SchemaViolation::new(
                    path,
                    "is required when the feature is enabled",
                ));
            }
        };
        require(self.sass.enabled, "sass.includePath", &self.sass.include_path);
        require(self.less.enabled, "less.includePath", &self.less.include_path);
        require(self.js_concat.enabled, "jsConcat.finalName", &self.js_concat.final_name);
        require(self.css_concat.enabled, "cssConcat.finalName", &self.css_concat.final_name);
        require(self.header.enabled, "header.packageJsonPath", &self.header.package_json_path);
        require(self.themeroller.enabled, "themeroller.finalName", &self.themeroller.final_name);
        if self.themeroller.enabled && self.themeroller.files.is_empty() {
            violations.push(SchemaViolation::new(
                "themeroller.files",
                "must list at least one file when the feature is enabled",
            ));
        }
        if self.src_folder.as_os_str().is_empty() {
            violations.push(SchemaViolation::new("srcFolder", "must not be empty"));
        }
        if self.dist_folder.as_os_str().is_empty() {
            violations.push(SchemaViolation::new("distFolder", "must not be empty"));
        }
        if !violations.is_empty() {
            return Err(ConfigError::SchemaViolation {
                project: project.to_string(),
                violations,
            });
        }

        let src = normalize(&self.src_folder);
        let dist = normalize(&self.dist_folder);
        let dot = Path::new(".");
        let overlap = src.starts_with(&dist)
            || dist.starts_with(&src)
            || (dist == dot && src.is_relative())
            || (src == dot && dist.is_relative());
        if overlap {
            return Err(ConfigError::InvalidLayout { src, dist });
        }

        Ok(())
    }
}

/// Lexically normalise a folder setting: drop `.` components and trailing slashes
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value (scalar, array, null)
/// replaces the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Parse a raw user config into its project map
pub fn parse_user_config(
    raw: &str,
    format: ConfigFormat,
) -> Result<serde_json::Map<String, Value>, ConfigError> {
    let value: Value = match format {
        ConfigFormat::Json => {
            serde_json::from_str(raw).map_err(|e| ConfigError::MalformedInput(e.to_string()))?
        }
        ConfigFormat::Yaml => {
            serde_yaml::from_str(raw).map_err(|e| ConfigError::MalformedInput(e.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::MalformedInput(
            "the top level must map project names to config objects".to_string(),
        )),
    }
}

/// Resolves a named project against a default configuration
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: Value,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver over the built-in defaults
    pub fn new() -> Self {
        Self {
            defaults: BuildConfig::default_value(),
        }
    }

    /// Resolver over a custom default tree
    pub fn with_defaults(defaults: Value) -> Self {
        Self { defaults }
    }

    /// Read a config file and resolve `project` from it
    pub fn load<P: AsRef<Path>>(&self, path: P, project: &str) -> Result<BuildConfig, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.resolve(&raw, ConfigFormat::from_path(path), project)
    }

    /// Parse, check, merge and validate one project entry
    pub fn resolve(
        &self,
        raw: &str,
        format: ConfigFormat,
        project: &str,
    ) -> Result<BuildConfig, ConfigError> {
        let projects = parse_user_config(raw, format)?;

        let entry = projects.get(project).ok_or_else(|| {
            let mut available: Vec<String> = projects.keys().cloned().collect();
            available.sort();
            ConfigError::MissingProject {
                project: project.to_string(),
                available,
            }
        })?;

        let violations = schema::check_project_entry(entry);
        if !violations.is_empty() {
            return Err(ConfigError::SchemaViolation {
                project: project.to_string(),
                violations,
            });
        }

        let mut merged = self.defaults.clone();
        deep_merge(&mut merged, entry);
        debug!("Merged config for {}: {}", project, merged);

        let mut config: BuildConfig =
            serde_json::from_value(merged).map_err(|e| ConfigError::SchemaViolation {
                project: project.to_string(),
                violations: vec![SchemaViolation::new("", e.to_string())],
            })?;

        config.validate(project)?;
        config.src_folder = normalize(&config.src_folder);
        config.dist_folder = normalize(&config.dist_folder);

        Ok(config)
    }
}
