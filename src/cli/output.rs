//! CLI output formatting

use crate::core::error::ConfigError;
use crate::core::state::{BuildOutcome, BuildReport};
use crate::execution::{BuildEvent, ReloadScope};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static EYES: Emoji<'_, '_> = Emoji("👀 ", "* ");

/// Create a progress bar for the initial build
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Human-readable byte size
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.2} kB", b / KB)
    } else {
        format!("{:.2} MB", b / (KB * KB))
    }
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Format a build event for display; `None` for events that stay in the log
pub fn format_build_event(event: &BuildEvent) -> Option<String> {
    let line = match event {
        BuildEvent::BuildStarted {
            build_id,
            pipelines,
        } => format!(
            "{} Building {} pipelines ({})",
            ROCKET,
            style(pipelines.len()).bold(),
            style(&build_id.to_string()[..8]).dim()
        ),
        BuildEvent::Cleaned { path } => {
            format!("{} Cleaned {}", INFO, style(path.display()).dim())
        }
        BuildEvent::PipelineStarted { pipeline } => {
            format!("{} {}", SPINNER, style(pipeline).cyan())
        }
        BuildEvent::StageMeasured {
            pipeline,
            stage,
            files,
            bytes,
        } => {
            if *stage == "emit" {
                return None;
            }
            format!(
                "{} {} {} {} files, {}",
                INFO,
                style(pipeline).dim(),
                style(stage).cyan(),
                files,
                style(format_bytes(*bytes)).bold()
            )
        }
        BuildEvent::TransformWarning { pipeline, warning } => format!(
            "{} {}: {}",
            WARN,
            style(pipeline).yellow(),
            style(warning).dim()
        ),
        BuildEvent::PipelineCompleted {
            pipeline,
            files_processed,
            artifacts,
            duration,
        } => format!(
            "{} {} ({} files in, {} written) {}",
            CHECK,
            style(pipeline).green(),
            files_processed,
            artifacts,
            style(format_duration(*duration)).dim()
        ),
        BuildEvent::PipelineFailed { pipeline, error } => {
            format!("{} {}: {}", CROSS, style(pipeline).red(), style(error).dim())
        }
        BuildEvent::BuildFinished {
            succeeded,
            failed,
            duration,
            ..
        } => {
            let status = if *failed == 0 {
                style("successfully").green().to_string()
            } else {
                style(format!("with {} failed", failed)).red().to_string()
            };
            format!(
                "{} Build finished {} ({} succeeded) in {}",
                INFO,
                status,
                succeeded,
                style(format_duration(*duration)).dim()
            )
        }
        BuildEvent::LiveReloadStarted { port } => format!(
            "{} Live-reload on {}",
            ROCKET,
            style(format!("http://localhost:{}", port)).cyan()
        ),
        BuildEvent::WatchStarted { roots } => format!(
            "{} Watching {} directories (Ctrl-C to stop)",
            EYES,
            style(roots.len()).bold()
        ),
        BuildEvent::ChangeDetected { path, pipelines } => {
            let names: Vec<&str> = pipelines.iter().map(|p| p.as_str()).collect();
            format!(
                "{} Changed {} → {}",
                INFO,
                style(path.display()).dim(),
                style(names.join(", ")).cyan()
            )
        }
        BuildEvent::ReloadRequested { scope, .. } => {
            let what = match scope {
                ReloadScope::Styles => "styles",
                ReloadScope::Full => "page",
            };
            format!("{} Reloading {}", INFO, style(what).dim())
        }
    };
    Some(line)
}

/// One summary line per pipeline of a report
pub fn format_report(report: &BuildReport) -> Vec<String> {
    report.outcomes.iter().map(format_outcome).collect()
}

fn format_outcome(outcome: &BuildOutcome) -> String {
    if let Some(error) = &outcome.error {
        return format!("  {} {} {}", CROSS, style(outcome.pipeline).red(), style(&error.cause).dim());
    }
    let mut line = format!(
        "  {} {} {} files, {}",
        CHECK,
        style(outcome.pipeline).green(),
        outcome.files_processed,
        format_bytes(outcome.total_bytes)
    );
    if outcome.minified_bytes > 0 {
        line.push_str(&format!(" ({} minified)", format_bytes(outcome.minified_bytes)));
    }
    if !outcome.warnings.is_empty() {
        line.push_str(&format!(
            " {}",
            style(format!("{} warnings", outcome.warnings.len())).yellow()
        ));
    }
    line
}

/// Red diagnostic for a fatal configuration problem
pub fn format_config_error(error: &ConfigError) -> String {
    match error {
        ConfigError::SchemaViolation {
            project,
            violations,
        } => {
            let mut lines = vec![format!(
                "{} {}",
                CROSS,
                style(format!("Config for project '{}' is not valid:", project)).red()
            )];
            lines.extend(
                violations
                    .iter()
                    .map(|v| format!("  {} {}", style(&v.path).bold(), style(&v.message).red())),
            );
            lines.join("\n")
        }
        other => format!("{} {}", CROSS, style(other).red()),
    }
}
