//! Seed reconciliation engine.
//!
//! Converges a content store to a [`SeedDataset`](crate::model::SeedDataset)
//! without duplicating documents on repeated runs.
//!
//! | Module        | Role                                                   |
//! |---------------|--------------------------------------------------------|
//! | [`resolve`]   | find the existing document for a natural key           |
//! | [`upsert`]    | create-or-update, then publish                         |
//! | [`publish`]   | move a document into its published state (non-fatal)   |
//! | [`relations`] | connect pages, sections and navigation (non-fatal)     |
//! | [`guard`]     | persisted run-once flag                                |
//! | [`pipeline`]  | the phase sequence and the run report                  |

pub mod guard;
pub mod pipeline;
pub mod publish;
pub mod relations;
pub mod resolve;
pub mod upsert;

use std::fmt;
use std::str::FromStr;

use cms_seed_store::{ContentType, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DatasetError, LocaleCode};

pub use guard::{GuardRecord, RunGuard};
pub use pipeline::{EntityFailure, MediaAssets, RunReport, plan, run};
pub use publish::{PublishState, ensure_published};
pub use relations::{RelationResult, SeededEntities, connect, wire_relations};
pub use resolve::{resolve, resolve_in};
pub use upsert::{UpsertAction, Upserted, upsert};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which side of the page/section relation is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationStrategy {
    /// Connect sections through `page.sections` (one write per page).
    #[default]
    Inverse,
    /// Set `section.page` on every section.
    Forward,
}

impl fmt::Display for RelationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inverse => f.write_str("inverse"),
            Self::Forward => f.write_str("forward"),
        }
    }
}

/// What a failed document write does to the rest of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop at the first failed document.
    #[default]
    Abort,
    /// Record the failure and keep going; the run still fails at the end.
    Continue,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::Continue => f.write_str("continue"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            _ => Err(format!("invalid error policy '{s}'. Use: abort or continue")),
        }
    }
}

/// Media-library name fragments attached to the site settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaNames {
    pub logo: String,
    pub favicon: String,
}

impl Default for MediaNames {
    fn default() -> Self {
        Self {
            logo: "openhr-mark-full-open".to_owned(),
            favicon: "favicon".to_owned(),
        }
    }
}

/// Knobs for one seed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedOptions {
    /// Store section anchors as `<pageSlug>-<anchor>`.
    pub composite_anchors: bool,
    pub relation_strategy: RelationStrategy,
    pub on_error: ErrorPolicy,
    /// Locale for pages that do not name one.
    pub default_locale: LocaleCode,
    /// Grant the public role read access before seeding.
    pub public_read: bool,
    pub media: MediaNames,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            composite_anchors: true,
            relation_strategy: RelationStrategy::default(),
            on_error: ErrorPolicy::default(),
            default_locale: LocaleCode::default(),
            public_read: true,
            media: MediaNames::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SeedError
// ---------------------------------------------------------------------------

/// Fatal seed-run failures.
///
/// Relation and publish problems never surface here; they are recorded in
/// the [`RunReport`].
#[derive(Debug, Error)]
pub enum SeedError {
    /// The dataset breaks a content rule; nothing was written.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The store is unreachable or refused the credentials.
    #[error(
        "cannot use content store {target}: {source}\n  To fix: check the base URL and that the API token is valid and has write access."
    )]
    Connectivity {
        target: String,
        #[source]
        source: StoreError,
    },

    /// A document could not be written under the abort policy.
    #[error("failed to seed {kind} `{key}`: {source}")]
    Entity {
        kind: ContentType,
        key: String,
        #[source]
        source: StoreError,
    },

    /// A record could not be turned into a store payload.
    #[error("cannot encode {kind} `{key}`: {source}")]
    Encode {
        kind: ContentType,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SeedError {
    /// Classify a store failure for document `kind`/`key`.
    pub(crate) fn from_store(target: &str, kind: ContentType, key: &str, source: StoreError) -> Self {
        if source.is_connectivity() {
            Self::Connectivity {
                target: target.to_owned(),
                source,
            }
        } else {
            Self::Entity {
                kind,
                key: key.to_owned(),
                source,
            }
        }
    }
}
