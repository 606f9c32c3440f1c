//! Content-store abstraction for cms-seed.
//!
//! This crate defines the [`ContentStore`] trait, the single interface the
//! seed engine uses to read and write CMS documents, plus [`FlagStore`] for
//! the run-once marker. The engine never talks HTTP or touches store files
//! directly; it programs against the traits.
//!
//! # Crate layout
//!
//! - [`store`]: the [`ContentStore`] and [`FlagStore`] traits.
//! - [`types`]: value types used in trait signatures ([`ContentType`],
//!   [`DocumentId`], [`KeyFilter`], [`Record`], etc.).
//! - [`error`]: the [`StoreError`] enum returned by all trait methods.
//! - [`local`]: [`LocalStore`], the in-process document store.
//! - [`rest`]: [`RestStore`], the hosted REST API client.
//! - [`flags`]: [`StateFile`], file-backed flags for remote targets.
//! - [`dry_run`]: [`DryRunStore`], records writes instead of sending them.

pub mod dry_run;
pub mod error;
pub mod flags;
pub mod local;
pub mod rest;
pub mod store;
pub mod types;

pub use dry_run::{DryRunStore, PlannedAction, PlannedWrite};
pub use error::StoreError;
pub use flags::StateFile;
pub use local::{LocalOptions, LocalStore};
pub use rest::{RestOptions, RestStore};
pub use store::{ContentStore, FlagStore};
pub use types::{ContentType, DocumentId, KeyFilter, MediaRef, PublishOutcome, Record, Scope};

pub(crate) use local::write_atomic;

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
