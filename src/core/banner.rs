//! License banner rendered from `package.json` metadata

use crate::core::config::BuildConfig;
use crate::core::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// The subset of `package.json` the banner uses
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageMeta {
    pub name: String,
    pub description: String,
    pub author: serde_json::Value,
    pub version: String,
    pub homepage: String,
    pub license: String,
}

impl PackageMeta {
    /// Load `package.json` from the given directory
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("package.json");
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::PackageMetadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::PackageMetadata {
            path,
            message: e.to_string(),
        })
    }

    fn author(&self) -> String {
        match &self.author {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }

    /// Render the fixed comment banner prepended to scripts and styles
    pub fn banner(&self) -> String {
        [
            "/*!".to_string(),
            format!(" * {} - {}", self.name, self.description),
            format!(" * @author v{}", self.author()),
            format!(" * @version v{}", self.version),
            format!(" * @link {}", self.homepage),
            format!(" * @license {}", self.license),
            " */".to_string(),
            String::new(),
        ]
        .join("\n")
    }
}

/// Banner text for a configuration, or `None` when headers are disabled
pub fn load_banner(config: &BuildConfig) -> Result<Option<String>, ConfigError> {
    if !config.header.enabled {
        return Ok(None);
    }
    let meta = PackageMeta::load(Path::new(&config.header.package_json_path))?;
    Ok(Some(meta.banner()))
}
