use anyhow::Result;
use clap::Subcommand;
use cms_seed::config::SeedConfig;
use cms_seed::format::OutputFormat;
use cms_seed::seed::{GuardRecord, RunGuard};
use serde::Serialize;

use crate::target::{Backend, TargetArgs};

#[derive(Subcommand, Debug)]
pub enum GuardCommands {
    /// Show whether this environment has been seeded
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Clear the run-once flag so the next `run` seeds again
    Reset {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Serialize)]
struct GuardEnvelope<'a> {
    environment: &'a str,
    key: &'a str,
    location: String,
    set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a GuardRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleared: Option<bool>,
}

pub fn run(cmd: &GuardCommands, mut config: SeedConfig, format: OutputFormat) -> Result<()> {
    let (GuardCommands::Status { target } | GuardCommands::Reset { target }) = cmd;
    target.apply(&mut config);
    let mut backend = Backend::open(&config, target.token(&config))?;
    let guard = RunGuard::new(&config.target.environment, &config.guard.key);

    let record = backend.with_flags(|flags| guard.status(flags))?;
    let cleared = match cmd {
        GuardCommands::Status { .. } => None,
        GuardCommands::Reset { .. } => Some(backend.with_flags(|flags| guard.reset(flags))?),
    };
    let envelope = GuardEnvelope {
        environment: guard.environment(),
        key: guard.key(),
        location: backend.flags_location(),
        set: record.is_some() && cleared.is_none(),
        record: record.as_ref(),
        cleared,
    };

    if format == OutputFormat::Json {
        println!("{}", format.serialize(&envelope)?);
        return Ok(());
    }

    match (&record, cleared) {
        (_, Some(true)) => println!(
            "Cleared '{}' for environment '{}'; the next run will seed.",
            guard.key(),
            guard.environment()
        ),
        (_, Some(false)) => println!(
            "'{}' was not set for environment '{}'; nothing to clear.",
            guard.key(),
            guard.environment()
        ),
        (Some(record), None) => {
            println!(
                "Environment '{}' has been seeded ({}).",
                guard.environment(),
                record.attempted_at.as_deref().unwrap_or("time unknown")
            );
            if let Some(fingerprint) = &record.fingerprint {
                println!("  dataset fingerprint: {fingerprint}");
            }
        }
        (None, None) => println!(
            "Environment '{}' has not been seeded; the next run will seed.",
            guard.environment()
        ),
    }
    println!("  flag stored in {}", envelope.location);
    Ok(())
}
