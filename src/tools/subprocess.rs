//! Subprocess tool - pipes a file through an external command

use crate::core::config::ToolCommand;
use crate::tools::{AssetTool, ToolError, ToolInput};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `program args...`, writing the file to stdin and reading the result from stdout
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    args: Vec<String>,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_command(command: &ToolCommand) -> Self {
        Self::new(command.program.clone(), command.args.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Render the argument templates for one input.
    ///
    /// `{{ file }}` and `{{ dir }}` come from the input path, every other
    /// `{{ key }}` from the step options.
    pub fn render_args(&self, input: &ToolInput) -> Vec<String> {
        let mut variables: BTreeMap<String, String> = input.options.clone();
        variables.insert("file".to_string(), input.path.display().to_string());
        let dir = input
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string());
        variables.insert("dir".to_string(), dir);

        self.args
            .iter()
            .map(|template| {
                let mut arg = template.clone();
                for (key, value) in &variables {
                    let placeholder = format!("{{{{ {} }}}}", key);
                    arg = arg.replace(&placeholder, value);
                }
                arg
            })
            .collect()
    }
}

#[async_trait]
impl AssetTool for CommandTool {
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        let args = self.render_args(input);
        debug!("Spawning {} {:?} for {}", self.program, args, input.path.display());

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from a separate task so a chatty tool cannot deadlock on a full pipe
        if let Some(mut stdin) = child.stdin.take() {
            let contents = input.contents.clone();
            let program = self.program.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&contents).await {
                    debug!("{} closed stdin early: {}", program, e);
                }
            });
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            let code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.program, code, message);
            return Err(ToolError::ExitStatus {
                program: self.program.clone(),
                code,
                message,
            });
        }

        debug!("{} returned {} bytes", self.program, output.stdout.len());
        Ok(output.stdout)
    }
}
