use anyhow::{Context, Result};
use frontend_boost::cli::output::*;
use frontend_boost::cli::Cli;
use frontend_boost::core::banner::load_banner;
use frontend_boost::core::{ConfigResolver, LayoutPlanner};
use frontend_boost::execution::{BuildEvent, Orchestrator};
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Configuration problems are fatal before anything is written
    let config = match ConfigResolver::new().load(&cli.config, &cli.project) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_config_error(&e));
            std::process::exit(1);
        }
    };
    debug!("Resolved config: {:?}", config);
    println!(
        "{} Loaded project {} from {}",
        INFO,
        style(&cli.project).bold(),
        style(cli.config.display()).dim()
    );

    let banner = match load_banner(&config) {
        Ok(banner) => banner,
        Err(e) => {
            eprintln!("{}", format_config_error(&e));
            std::process::exit(1);
        }
    };

    if let Err(e) = LayoutPlanner::plan(&config).ensure() {
        eprintln!("{} {}", CROSS, style(e).red());
        std::process::exit(1);
    }

    let mut orchestrator =
        Orchestrator::new(Arc::new(config), cli.strategy()).with_banner(banner);

    let progress = create_progress_bar(orchestrator.plan().pipelines().len());
    let bar = progress.clone();
    orchestrator.add_event_handler(move |event| {
        if let Some(line) = format_build_event(&event) {
            bar.suspend(|| println!("{}", line));
        }
        if matches!(
            event,
            BuildEvent::PipelineCompleted { .. } | BuildEvent::PipelineFailed { .. }
        ) && !bar.is_finished()
        {
            bar.inc(1);
        }
    });

    let report = orchestrator.build().await.context("Build failed")?;
    progress.finish_and_clear();
    for line in format_report(&report) {
        println!("{}", line);
    }

    orchestrator.serve().await.context("Watch failed")?;
    println!("\n{} Stopped watching", INFO);

    Ok(())
}
