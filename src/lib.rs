//! cms-seed library crate.
//!
//! The primary interface is the `cms-seed` binary. The library exposes the
//! data model, the reconciliation engine and the verifier so integration
//! tests (and embedding programs) can drive a seed run against any
//! [`ContentStore`](cms_seed_store::ContentStore) directly.

pub mod config;
pub mod format;
pub mod model;
pub mod seed;
pub mod telemetry;
pub mod verify;

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
