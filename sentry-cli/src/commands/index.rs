//! Index command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use sentry_core::{RebuildStats, Sentry, SentryConfig};
use tracing::info;

use crate::exit_codes::ExitCode;

/// Execute the index command.
pub async fn execute(config: SentryConfig, json: bool, quiet: bool) -> Result<ExitCode> {
    let dir = config.reference_dir.clone();
    let sentry = Sentry::open(config).context("Failed to open reference database")?;
    let stats = sentry
        .rebuild()
        .await
        .context("Failed to index reference images")?;
    sentry.shutdown();

    info!(dir = %dir.display(), generation = stats.generation, "Index rebuilt");

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if !quiet {
        print_stats(&dir.display().to_string(), &stats);
    }
    Ok(ExitCode::success())
}

fn print_stats(dir: &str, stats: &RebuildStats) {
    println!();
    println!("{}", "Reference index rebuilt".green().bold());
    println!();
    println!("   {} {}", "Directory:".dimmed(), dir);
    println!("   {} {}", "Files seen:".dimmed(), stats.files_seen);
    println!("   {} {}", "Hashes indexed:".dimmed(), stats.hashes_indexed);
    println!(
        "   {} {}",
        "Descriptor sets:".dimmed(),
        stats.descriptor_sets_indexed
    );
    if stats.decode_failures > 0 {
        println!(
            "   {} {}",
            "Not decodable:".dimmed(),
            stats.decode_failures.to_string().yellow()
        );
    }
    if stats.failures > 0 {
        println!(
            "   {} {}",
            "Unreadable:".dimmed(),
            stats.failures.to_string().red()
        );
    }
    println!("   {} {}ms", "Duration:".dimmed(), stats.duration_ms);
}
