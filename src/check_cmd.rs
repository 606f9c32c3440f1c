use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use cms_seed::config::SeedConfig;
use cms_seed::format::OutputFormat;
use cms_seed::model::{SeedDataset, Violation};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Seed dataset (JSON)
    #[arg(long)]
    pub dataset: Option<PathBuf>,
}

#[derive(Serialize)]
struct CheckEnvelope<'a> {
    dataset: String,
    valid: bool,
    fingerprint: &'a str,
    documents: usize,
    violations: &'a [Violation],
}

/// Validate a dataset offline.
pub fn run(args: &CheckArgs, config: &SeedConfig, format: OutputFormat) -> Result<()> {
    let path = args.dataset.as_ref().unwrap_or(&config.seed.dataset);
    let dataset = SeedDataset::load(path)?;
    let violations = dataset.violations(config.seed.composite_anchors);

    match format {
        OutputFormat::Json => {
            let envelope = CheckEnvelope {
                dataset: path.display().to_string(),
                valid: violations.is_empty(),
                fingerprint: dataset.fingerprint(),
                documents: dataset.document_count(),
                violations: &violations,
            };
            println!("{}", format.serialize(&envelope)?);
        }
        OutputFormat::Text => {
            if violations.is_empty() {
                println!(
                    "[OK] {}: {} document(s), fingerprint {}",
                    path.display(),
                    dataset.document_count(),
                    dataset.fingerprint()
                );
            } else {
                for violation in &violations {
                    println!("[FAIL] {violation}");
                }
            }
        }
    }

    if !violations.is_empty() {
        bail!("{}: {} violation(s)", path.display(), violations.len());
    }
    Ok(())
}
