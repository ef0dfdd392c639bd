#![forbid(unsafe_code)]

mod cli;

use std::process;

use anyhow::Context;
use pricelist_sync::{PriceCatalog, RetentionManager, SyncPipeline};

use crate::cli::{Cli, Command};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "pricelist_sync::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "pricelist_sync::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "pricelist_sync::config";
pub const TRACING_TARGET_EVENTS: &str = "pricelist_sync::events";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        let message = format!("{error:#}");
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %message,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    Cli::log_build_info();
    cli.log_config();

    match &cli.command {
        Command::Sync => sync(&cli).await,
        Command::Lookup { keyword } => lookup(&cli, &keyword.join(" ")).await,
        Command::Cleanup { keep } => cleanup(&cli, *keep).await,
    }
}

/// Runs the pipeline once.
async fn sync(cli: &Cli) -> anyhow::Result<()> {
    let pipeline =
        SyncPipeline::from_config(cli.to_config()).context("failed to initialize sync pipeline")?;

    let mut events = pipeline.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::debug!(target: TRACING_TARGET_EVENTS, event = %json, "pipeline event"),
                Err(e) => tracing::debug!(target: TRACING_TARGET_EVENTS, error = %e, "unserializable event"),
            }
        }
    });

    let result = pipeline.run().await;
    drop(pipeline);
    event_log.await.ok();
    let report = result?;
    tracing::info!(
        target: TRACING_TARGET_SHUTDOWN,
        backup = %report.artifact.name,
        export = ?report.export_path,
        rows = report.rows,
        restore_warnings = report.restore_warnings.len(),
        removed_exports = report.cleanup.removed.len(),
        "sync completed"
    );
    Ok(())
}

/// Prints the matches for `keyword` from the latest export.
async fn lookup(cli: &Cli, keyword: &str) -> anyhow::Result<()> {
    let config = cli.to_config();
    let catalog = PriceCatalog::new(&config.paths.exports_dir);
    let snapshot = catalog
        .reload()
        .await
        .context("failed to load the latest export")?;

    let results = snapshot.search(keyword, config.search_results_limit);
    if results.items.is_empty() {
        println!("No items match \"{keyword}\".");
        return Ok(());
    }

    println!(
        "{} (exported {}):",
        snapshot.source.display(),
        snapshot.loaded_at.format("%Y-%m-%d %H:%M")
    );
    for row in &results.items {
        println!("  {}", cli::format_row(row));
    }
    if results.truncated {
        println!("More items match; use a more specific keyword.");
    }
    Ok(())
}

/// Applies export retention without running the pipeline.
async fn cleanup(cli: &Cli, keep: Option<usize>) -> anyhow::Result<()> {
    let keep = cli.retention_keep(keep)?;

    let config = cli.to_config();
    let manager = RetentionManager::new(&config.paths.exports_dir, keep);
    let report = manager.cleanup(None).await?;
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    println!("{} exports kept", report.kept.len());
    Ok(())
}
