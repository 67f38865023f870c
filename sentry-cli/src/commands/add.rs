//! Add command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sentry_core::{Sentry, SentryConfig};
use tracing::info;

use crate::exit_codes::ExitCode;
use crate::utils::{display_name, read_input};

/// Execute the add command.
pub async fn execute(
    config: SentryConfig,
    file: PathBuf,
    id: Option<String>,
    quiet: bool,
) -> Result<ExitCode> {
    let bytes = read_input(&file)?;
    let filename = display_name(&file);

    let sentry = Sentry::open(config).context("Failed to open reference database")?;
    let added = match id {
        Some(id) => sentry.add_reference_with_id(id, filename, bytes).await,
        None => sentry.add_reference(filename, bytes).await,
    }
    .context("Failed to add reference image")?;
    sentry.shutdown();

    info!(
        stored_as = %added.stored_as,
        generation = added.stats.generation,
        "Reference added"
    );

    if !quiet {
        println!();
        println!("{}", "Reference image added".green().bold());
        println!();
        println!("   {} {}", "Stored as:".dimmed(), added.path.display());
        println!(
            "   {} {}",
            "Hashes indexed:".dimmed(),
            added.stats.hashes_indexed
        );
        println!(
            "   {} {}",
            "Descriptor sets:".dimmed(),
            added.stats.descriptor_sets_indexed
        );
    }
    Ok(ExitCode::success())
}
