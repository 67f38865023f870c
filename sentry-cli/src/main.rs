//! Sentry CLI - index reference images and scan attachments against them.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success, no blacklisted image found
  1   General error
  65  At least one scanned file matched a reference image
  66  Input file or reference directory could not be read
  74  New reference could not be written";

#[derive(Parser)]
#[command(name = "sentry")]
#[command(author, version, about = "Blacklisted image detection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Reference image directory [env: BLACKLIST_DIR]
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Mutual-match count a reference must exceed [env: MATCH_THRESHOLD]
    #[arg(long, global = true, value_name = "N")]
    threshold: Option<usize>,

    /// CPU worker threads [env: WORKER_THREADS]
    #[arg(long, global = true, value_name = "N")]
    workers: Option<usize>,

    /// Keypoint cap per image [env: MAX_KEYPOINTS]
    #[arg(long, global = true, value_name = "N")]
    max_keypoints: Option<usize>,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the reference index and print its statistics
    Index {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan files against the reference images
    Scan {
        /// Files to scan
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Print one JSON verdict per line
        #[arg(long)]
        json: bool,
    },

    /// Add a file to the reference images
    Add {
        /// Image to blacklist
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Attachment id used as the stored filename prefix (default: random UUID)
        #[arg(long)]
        id: Option<String>,
    },
}

fn init_tracing(quiet: bool, verbose: bool) {
    let default_filter = if quiet {
        "error"
    } else if verbose {
        "sentry_core=debug,sentry_cli=debug,info"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_ansi(colored::control::SHOULD_COLORIZE.should_colorize())
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = utils::build_config(utils::ConfigOverrides {
        dir: cli.dir,
        threshold: cli.threshold,
        workers: cli.workers,
        max_keypoints: cli.max_keypoints,
    });

    match cli.command {
        Commands::Index { json } => commands::index::execute(config, json, cli.quiet).await,
        Commands::Scan { files, json } => {
            commands::scan::execute(config, files, json, cli.quiet).await
        }
        Commands::Add { file, id } => commands::add::execute(config, file, id, cli.quiet).await,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.quiet, cli.verbose);

    let exit = match run(cli).await {
        Ok(exit) => exit,
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
