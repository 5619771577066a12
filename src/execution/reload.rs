//! Live-reload collaborator: a dev server that refreshes connected browsers

use crate::core::config::{BuildConfig, LiveReloadConfig};
use crate::core::pipeline::PipelineName;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a browser has to refresh after a rerun
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    /// Swap stylesheets in place
    Styles,
    /// Reload the whole page
    Full,
}

impl ReloadScope {
    /// Stylesheets can be swapped in place; everything else needs a full reload
    pub fn for_pipeline(pipeline: PipelineName) -> Self {
        match pipeline {
            PipelineName::Style => ReloadScope::Styles,
            _ => ReloadScope::Full,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write live-reload config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for live-reload servers - allows for different implementations
#[async_trait]
pub trait LiveReload: Send + Sync {
    /// Bring the server up
    async fn start(&self) -> Result<(), ReloadError>;

    /// Ask connected browsers to refresh; must not block the caller
    fn notify(&self, scope: ReloadScope);
}

/// Used when live-reload is disabled
#[derive(Debug, Default)]
pub struct NoReload;

#[async_trait]
impl LiveReload for NoReload {
    async fn start(&self) -> Result<(), ReloadError> {
        Ok(())
    }

    fn notify(&self, _scope: ReloadScope) {}
}

/// Cookie telling the proxied application where to load images from
pub const APP_IMAGES_COOKIE: &str = "oos-apex-frontend-boost-app-images";

/// Proxy middleware: points the image cookie at the dev server's own host
const IMAGES_MIDDLEWARE: &str = "function (req, res, next) {
    res.setHeader('Set-Cookie', ['COOKIE=//' + req.headers.host + '/']);
    next();
}";

/// Drives a `browser-sync` proxy in front of the application URL
pub struct BrowserSync {
    program: String,
    settings: LiveReloadConfig,
    app_url: String,
    serve_static: PathBuf,
    config_path: PathBuf,
    child: Mutex<Option<Child>>,
}

impl BrowserSync {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            program: "browser-sync".to_string(),
            settings: config.browsersync.clone(),
            app_url: config.app_url.clone(),
            serve_static: config.dist_folder.clone(),
            config_path: std::env::temp_dir()
                .join(format!("frontend-boost-bs-{}.js", Uuid::new_v4())),
            child: Mutex::new(None),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Where the generated `--config` module is written on start
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Server options as plain data; [`render_config`](Self::render_config) adds the proxy middleware
    pub fn options(&self) -> Value {
        json!({
            "port": self.settings.port,
            "notify": self.settings.notify,
            "open": false,
            "proxy": self.app_url,
            "serveStatic": [self.serve_static.display().to_string()],
            "ui": {
                "port": self.settings.ui_port,
                "weinre": { "port": self.settings.weinre_port }
            }
        })
    }

    /// The config module handed to `browser-sync start --config`
    pub fn render_config(&self) -> String {
        let options = serde_json::to_string_pretty(&self.options())
            .unwrap_or_else(|_| "{}".to_string());
        let middleware = IMAGES_MIDDLEWARE.replace("COOKIE", APP_IMAGES_COOKIE);
        format!(
            "const options = {options};\n\
             options.proxy = {{\n    target: options.proxy,\n    middleware: {middleware}\n}};\n\
             module.exports = options;\n"
        )
    }

    pub fn start_args(&self) -> Vec<String> {
        vec![
            "start".to_string(),
            "--config".to_string(),
            self.config_path.display().to_string(),
        ]
    }

    pub fn reload_args(&self, scope: ReloadScope) -> Vec<String> {
        let mut args = vec![
            "reload".to_string(),
            "--port".to_string(),
            self.settings.port.to_string(),
        ];
        if scope == ReloadScope::Styles {
            args.push("--files".to_string());
            args.push("*.css".to_string());
        }
        args
    }
}

/// Build the live-reload collaborator a configuration asks for
pub fn live_reload_for(config: &BuildConfig) -> Arc<dyn LiveReload> {
    if config.browsersync.enabled {
        Arc::new(BrowserSync::new(config))
    } else {
        Arc::new(NoReload)
    }
}

#[async_trait]
impl LiveReload for BrowserSync {
    async fn start(&self) -> Result<(), ReloadError> {
        tokio::fs::write(&self.config_path, self.render_config())
            .await
            .map_err(|source| ReloadError::Config {
                path: self.config_path.clone(),
                source,
            })?;
        let args = self.start_args();
        debug!("Starting {} {:?}", self.program, args);
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        *self.child.lock().await = Some(child);
        info!(
            "Live-reload proxy for {} on port {}",
            self.app_url, self.settings.port
        );
        Ok(())
    }

    fn notify(&self, scope: ReloadScope) {
        let program = self.program.clone();
        let args = self.reload_args(scope);
        tokio::spawn(async move {
            let status = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => debug!("Reload sent ({:?})", args),
                Ok(s) => warn!("{} reload exited with {}", program, s),
                Err(e) => warn!("Failed to run {} reload: {}", program, e),
            }
        });
    }
}
