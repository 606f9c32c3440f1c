use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use cms_seed::config::SeedConfig;
use cms_seed::format::OutputFormat;
use cms_seed::model::SeedDataset;
use cms_seed::seed::pipeline::probe;
use cms_seed::seed::{self, ErrorPolicy, GuardRecord, RunGuard, RunReport, UpsertAction};
use serde::Serialize;
use tracing::info;

use crate::target::{Backend, TargetArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Seed dataset (JSON)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Seed even if the run guard says this environment was already seeded
    #[arg(long)]
    pub force: bool,

    /// Show the writes a run would perform, perform none, leave the guard alone
    #[arg(long)]
    pub dry_run: bool,

    /// Keep going after a document fails; the run still exits non-zero
    #[arg(long)]
    pub continue_on_error: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
enum RunStatus {
    Seeded,
    Failed,
    Skipped,
    Planned,
}

#[derive(Serialize)]
struct RunEnvelope<'a> {
    status: RunStatus,
    environment: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    guard: Option<&'a GuardRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a RunReport>,
}

/// Seed the configured store.
pub fn run(args: &RunArgs, mut config: SeedConfig, format: OutputFormat) -> Result<()> {
    args.target.apply(&mut config);
    if let Some(dataset) = &args.dataset {
        config.seed.dataset.clone_from(dataset);
    }
    if args.continue_on_error {
        config.seed.on_error = ErrorPolicy::Continue;
    }
    let options = config.seed_options();
    let environment = config.target.environment.clone();

    let dataset = SeedDataset::load(&config.seed.dataset)?;
    dataset.validate(options.composite_anchors)?;
    let mut backend = Backend::open(&config, args.target.token(&config))?;

    if args.dry_run {
        let report = seed::plan(backend.store(), &dataset, &options)?;
        return print(format, RunStatus::Planned, &environment, None, Some(&report));
    }

    // An unreachable store must not consume the guard.
    probe(backend.store())?;

    let guard = RunGuard::new(&environment, &config.guard.key);
    if config.guard.enabled && !args.force {
        let fingerprint = dataset.fingerprint();
        let first = backend
            .with_flags(|flags| guard.should_run(flags, fingerprint))
            .context("reading the run guard")?;
        if !first {
            let record = backend.with_flags(|flags| guard.status(flags))?;
            return print(format, RunStatus::Skipped, &environment, record.as_ref(), None);
        }
    } else if config.guard.enabled {
        info!(environment = %environment, "forced run; guard bypassed");
        backend
            .with_flags(|flags| guard.mark(flags, dataset.fingerprint()))
            .context("writing the run guard")?;
    }

    let report = seed::run(backend.store_mut(), &dataset, &options)?;
    let status = if report.is_success() {
        RunStatus::Seeded
    } else {
        RunStatus::Failed
    };
    print(format, status, &environment, None, Some(&report))?;

    if !report.is_success() {
        bail!(
            "{} document(s) failed to seed; fix them and re-run with --force",
            report.failures.len()
        );
    }
    Ok(())
}

fn print(
    format: OutputFormat,
    status: RunStatus,
    environment: &str,
    guard: Option<&GuardRecord>,
    report: Option<&RunReport>,
) -> Result<()> {
    if format == OutputFormat::Json {
        let envelope = RunEnvelope {
            status,
            environment,
            guard,
            report,
        };
        println!("{}", format.serialize(&envelope)?);
        return Ok(());
    }

    if matches!(status, RunStatus::Skipped) {
        let when = guard
            .and_then(|g| g.attempted_at.as_deref())
            .unwrap_or("an earlier run");
        println!("Seed already ran for environment '{environment}' ({when}); nothing to do.");
        println!("  To re-seed: cms-seed run --force, or cms-seed guard reset");
        return Ok(());
    }

    let Some(report) = report else {
        return Ok(());
    };
    print_report(report);
    Ok(())
}

fn print_report(report: &RunReport) {
    let heading = if report.dry_run {
        "cms-seed run (dry run)"
    } else {
        "cms-seed run"
    };
    println!("{heading}: {}", report.target);
    println!();

    for entity in &report.entities {
        let verb = match entity.action {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
        };
        println!("[OK] {} `{}` {verb}", entity.kind, entity.key);
        if let seed::PublishState::Failed(error) = &entity.publish {
            println!("[WARN] {} `{}` not published: {error}", entity.kind, entity.key);
        }
    }
    for failure in &report.failures {
        println!("[FAIL] {} `{}`: {}", failure.kind, failure.key, failure.error);
    }
    for relation in &report.relations {
        if let Some(error) = &relation.error {
            println!(
                "[WARN] {} `{}`.{} not wired: {error}",
                relation.kind, relation.owner, relation.field
            );
        }
        if let Some(seed::PublishState::Failed(error)) = &relation.publish {
            println!(
                "[WARN] {} `{}` not republished after wiring {}: {error}",
                relation.kind, relation.owner, relation.field
            );
        }
    }
    for warning in &report.warnings {
        println!("[WARN] {warning}");
    }

    if !report.planned.is_empty() {
        println!();
        println!("Planned writes:");
        for write in &report.planned {
            println!("  {:?} {} {}", write.action, write.kind, write.detail);
        }
    }

    println!();
    println!(
        "{} created, {} updated, {} failed, {} relation(s) wired",
        report.count(UpsertAction::Created),
        report.count(UpsertAction::Updated),
        report.failures.len(),
        report.relations.len() - report.relation_failures(),
    );
    if report.is_success() {
        println!("Seed completed.");
    } else {
        println!("Seed finished with failures. See above for details.");
    }
}
