use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cms_seed::config::{DEFAULT_CONFIG_FILE, SeedConfig};
use cms_seed::format::OutputFormat;

mod check_cmd;
mod guard_cmd;
mod run_cmd;
mod target;
mod verify_cmd;

/// Idempotent seeding for the marketing-site CMS
///
/// Converges a content store to a declarative seed dataset: site settings,
/// footer, navigation, pages and their sections. Documents are matched by
/// natural key (href, slug, anchor), so running the seed again updates in
/// place instead of duplicating.
///
/// TARGETS:
///   local    JSON-file store, for development and tests (default)
///   remote   hosted CMS over its REST API (--url, CMS_SEED_TOKEN)
///
/// QUICK START:
///
///   cms-seed check --dataset data/seed-data.json
///   cms-seed run --dry-run
///   cms-seed run
///   cms-seed verify
///
/// The first run sets a per-environment flag; later runs skip until the
/// flag is cleared (cms-seed guard reset) or the run is forced (--force).
///
/// Logging: CMS_SEED_LOG=debug for detail, CMS_SEED_LOG_FORMAT=json for
/// structured events on stderr.
#[derive(Parser)]
#[command(name = "cms-seed")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(
    after_help = "See 'cms-seed <command> --help' for more information on a specific command."
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format: text or json
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the content store
    ///
    /// Validates the dataset, checks the store is reachable, then upserts
    /// every document and wires page/section and navigation/page relations.
    /// Skips when the run guard is set for this environment.
    Run(run_cmd::RunArgs),

    /// Check a content store against the dataset (read-only)
    ///
    /// Exits non-zero when a document is missing or duplicated, or a
    /// relation is incomplete.
    Verify(verify_cmd::VerifyArgs),

    /// Inspect or clear the run-once guard
    #[command(subcommand)]
    Guard(guard_cmd::GuardCommands),

    /// Validate a dataset file without contacting any store
    Check(check_cmd::CheckArgs),
}

fn main() -> Result<()> {
    cms_seed::telemetry::init();
    let cli = Cli::parse();
    let config = SeedConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(ref args) => run_cmd::run(args, config, cli.format),
        Commands::Verify(ref args) => verify_cmd::run(args, config, cli.format),
        Commands::Guard(ref cmd) => guard_cmd::run(cmd, config, cli.format),
        Commands::Check(ref args) => check_cmd::run(args, &config, cli.format),
    }
}
