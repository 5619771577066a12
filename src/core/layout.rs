//! Source and output directory layout

use crate::core::config::{BuildConfig, StyleDialect};
use crate::core::error::LayoutError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Asset subdirectory shared by the source and output trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetDir {
    Js,
    Css,
    Scss,
    Sass,
    Less,
    Img,
    Lib,
}

impl AssetDir {
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetDir::Js => "js",
            AssetDir::Css => "css",
            AssetDir::Scss => "scss",
            AssetDir::Sass => "sass",
            AssetDir::Less => "less",
            AssetDir::Img => "img",
            AssetDir::Lib => "lib",
        }
    }
}

/// Source and output roots of a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub src: PathBuf,
    pub dist: PathBuf,
}

impl ProjectPaths {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            src: config.src_folder.clone(),
            dist: config.dist_folder.clone(),
        }
    }

    pub fn source(&self, dir: AssetDir) -> PathBuf {
        self.src.join(dir.dir_name())
    }

    pub fn output(&self, dir: AssetDir) -> PathBuf {
        self.dist.join(dir.dir_name())
    }
}

/// The source directories a configuration requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySet {
    dirs: Vec<PathBuf>,
}

impl DirectorySet {
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Create every directory (and its ancestors); existing ones are left alone
    pub fn ensure(&self) -> Result<(), LayoutError> {
        for dir in &self.dirs {
            std::fs::create_dir_all(dir).map_err(|source| LayoutError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            debug!("Ensured source directory {}", dir.display());
        }
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.dirs.iter().any(|d| d == path)
    }
}

/// Derives the source layout from a configuration
pub struct LayoutPlanner;

impl LayoutPlanner {
    /// Scripts, images and libraries always; one stylesheet directory by dialect
    pub fn plan(config: &BuildConfig) -> DirectorySet {
        let paths = ProjectPaths::from_config(config);
        let style = match config.style_dialect() {
            StyleDialect::Sass => AssetDir::Scss,
            StyleDialect::Less => AssetDir::Less,
            StyleDialect::Css => AssetDir::Css,
        };

        let dirs = [AssetDir::Js, AssetDir::Img, AssetDir::Lib, style]
            .into_iter()
            .map(|dir| paths.source(dir))
            .collect();

        DirectorySet { dirs }
    }
}
