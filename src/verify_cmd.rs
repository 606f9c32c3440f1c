use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use cms_seed::config::SeedConfig;
use cms_seed::format::OutputFormat;
use cms_seed::model::SeedDataset;
use cms_seed::verify::{CheckStatus, verify};

use crate::target::{Backend, TargetArgs};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Seed dataset (JSON)
    #[arg(long)]
    pub dataset: Option<PathBuf>,
}

/// Check a store against the dataset without writing anything.
pub fn run(args: &VerifyArgs, mut config: SeedConfig, format: OutputFormat) -> Result<()> {
    args.target.apply(&mut config);
    if let Some(dataset) = &args.dataset {
        config.seed.dataset.clone_from(dataset);
    }
    let options = config.seed_options();
    let dataset = SeedDataset::load(&config.seed.dataset)?;
    let backend = Backend::open(&config, args.target.token(&config))?;

    let report = verify(backend.store(), &dataset, &options)?;

    match format {
        OutputFormat::Json => println!("{}", format.serialize(&report)?),
        OutputFormat::Text => {
            println!("cms-seed verify: {}", report.target);
            println!();
            for check in &report.checks {
                println!("{} {}: {}", check.status.prefix(), check.name, check.message);
            }
            println!();
            println!(
                "{} ok, {} warning(s), {} failed",
                report.count(CheckStatus::Ok),
                report.count(CheckStatus::Warn),
                report.count(CheckStatus::Fail),
            );
        }
    }

    if !report.is_success() {
        bail!(
            "{} check(s) failed; re-run `cms-seed run --force` to converge the store",
            report.count(CheckStatus::Fail)
        );
    }
    Ok(())
}
