//! Logging initialization.
//!
//! Controlled by two environment variables:
//! - `CMS_SEED_LOG`: an `EnvFilter` directive (default `info`), e.g.
//!   `cms_seed=debug,cms_seed_store=trace`
//! - `CMS_SEED_LOG_FORMAT`: `json` for one JSON object per event, anything
//!   else for human-readable lines
//!
//! Both formats write to stderr; stdout carries only command output.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive variable.
pub const LOG_ENV: &str = "CMS_SEED_LOG";
/// Output format variable.
pub const LOG_FORMAT_ENV: &str = "CMS_SEED_LOG_FORMAT";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}
