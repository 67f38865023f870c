//! Scan command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sentry_core::{MatchVerdict, Sentry, SentryConfig};
use serde::Serialize;
use tracing::{info, warn};

use crate::exit_codes::ExitCode;
use crate::utils::{display_name, read_input};

/// One JSON line of `scan --json` output.
#[derive(Serialize)]
struct ScanReport<'a> {
    file: String,
    is_match: bool,
    reason: Option<String>,
    verdict: &'a MatchVerdict,
}

/// Execute the scan command.
///
/// All files are read up front so a missing file fails before any scan.
pub async fn execute(
    config: SentryConfig,
    files: Vec<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let mut attachments = Vec::with_capacity(files.len());
    for file in &files {
        let name = display_name(file);
        if !sentry_core::is_supported_attachment(&name) {
            warn!(file = %name, "Unsupported extension, scanning anyway");
        }
        attachments.push(read_input(file)?);
    }

    let sentry = Sentry::start(config)
        .await
        .context("Failed to load reference images")?;

    let mut matched = 0usize;
    for (file, bytes) in files.iter().zip(attachments) {
        let verdict = sentry
            .scan(bytes)
            .await
            .with_context(|| format!("Failed to scan {}", file.display()))?;
        if verdict.is_match() {
            matched += 1;
        }
        info!(file = %file.display(), verdict = %verdict, "Scanned");

        if json {
            let report = ScanReport {
                file: file.display().to_string(),
                is_match: verdict.is_match(),
                reason: verdict.reason(),
                verdict: &verdict,
            };
            println!("{}", serde_json::to_string(&report)?);
        } else if !quiet {
            print_verdict(&file.display().to_string(), &verdict);
        }
    }
    sentry.shutdown();

    if matched > 0 {
        Ok(ExitCode::match_found())
    } else {
        Ok(ExitCode::success())
    }
}

fn print_verdict(file: &str, verdict: &MatchVerdict) {
    match verdict {
        MatchVerdict::NoMatch => println!("{} {}", "CLEAN".green().bold(), file),
        MatchVerdict::ExactMatch => println!(
            "{} {} {}",
            "BLACKLISTED".red().bold(),
            file,
            format!("({verdict})").dimmed()
        ),
        MatchVerdict::VisualMatch { matches, .. } => println!(
            "{} {} {}",
            "BLACKLISTED".red().bold(),
            file,
            format!("({verdict}, {matches} matches)").dimmed()
        ),
    }
}
