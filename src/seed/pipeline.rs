//! The seed run: phases, their ordering, and the report.
//!
//! ```text
//! validate ─► probe ─► permissions ─► media ─► entities ─► relations
//! ```
//!
//! Ordering is carried by types rather than convention. Every store phase
//! needs the [`Connected`] token that only [`probe`] produces, and relation
//! wiring needs the [`SeededEntities`] that only the entity phase produces.
//! The report is threaded through explicitly; there is no ambient state.

use cms_seed_store::{
    ContentStore, ContentType, DryRunStore, MediaRef, PlannedWrite, StoreError,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use super::relations::{RelationResult, SeededEntities, wire_relations};
use super::upsert::{UpsertAction, Upserted, upsert};
use super::{ErrorPolicy, MediaNames, SeedError, SeedOptions};
use crate::model::{SeedDataset, SeedEntity, stored_anchor};

/// Content types the public role may read, and the actions granted.
const PUBLIC_READ: &[(ContentType, &[&str])] = &[
    (ContentType::Page, &["find", "findOne"]),
    (ContentType::Section, &["find", "findOne"]),
    (ContentType::NavigationItem, &["find", "findOne"]),
    (ContentType::Footer, &["find"]),
    (ContentType::SiteSetting, &["find"]),
];

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A document that could not be written under [`ErrorPolicy::Continue`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub kind: ContentType,
    pub key: String,
    pub error: String,
}

/// Media attached to the site settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MediaAssets {
    pub logo: Option<MediaRef>,
    pub favicon: Option<MediaRef>,
}

/// Everything one run did (or, for a dry run, would do).
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub target: String,
    pub dry_run: bool,
    pub fingerprint: String,
    pub permissions_granted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub media: MediaAssets,
    pub entities: Vec<Upserted>,
    pub failures: Vec<EntityFailure>,
    pub relations: Vec<RelationResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<PlannedWrite>,
}

impl RunReport {
    /// No document failed. Relation and publish problems do not count.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn count(&self, action: UpsertAction) -> usize {
        self.entities.iter().filter(|e| e.action == action).count()
    }

    /// Failed publishes of seeded documents and of relation owners.
    #[must_use]
    pub fn publish_failures(&self) -> usize {
        self.entities.iter().filter(|e| e.publish.is_failed()).count()
            + self.relations.iter().filter(|r| r.publish_failed()).count()
    }

    #[must_use]
    pub fn relation_failures(&self) -> usize {
        self.relations.iter().filter(|r| !r.is_ok()).count()
    }

    /// The upsert record for `kind`/`key`, if that document was seeded.
    #[must_use]
    pub fn entity(&self, kind: ContentType, key: &str) -> Option<&Upserted> {
        self.entities.iter().find(|e| e.kind == kind && e.key == key)
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Proof that the store answered the connectivity probe.
#[derive(Debug)]
pub struct Connected {
    target: String,
}

/// List one page. Any failure here is a connectivity failure.
///
/// # Errors
/// Returns [`SeedError::Connectivity`].
pub fn probe(store: &dyn ContentStore) -> Result<Connected, SeedError> {
    let target = store.target();
    store.ping().map_err(|source| SeedError::Connectivity {
        target: target.clone(),
        source,
    })?;
    info!(%target, "content store reachable");
    Ok(Connected { target })
}

fn grant_public_read(_: &Connected, store: &mut dyn ContentStore, report: &mut RunReport) {
    for (kind, actions) in PUBLIC_READ {
        match store.grant_public_read(*kind, actions) {
            Ok(n) => report.permissions_granted += n,
            Err(e) => {
                warn!(%kind, error = %e, "could not grant public read access");
                report
                    .warnings
                    .push(format!("public read on {kind} not granted: {e}"));
            }
        }
    }
    info!(granted = report.permissions_granted, "public permissions checked");
}

fn lookup_media(
    _: &Connected,
    store: &dyn ContentStore,
    names: &MediaNames,
    report: &mut RunReport,
) -> MediaAssets {
    let mut find = |label: &str, name: &str| match store.find_media(name) {
        Ok(Some(media)) => Some(media),
        Ok(None) => {
            warn!(label, name, "media not found; continuing without it");
            None
        }
        Err(e) => {
            warn!(label, name, error = %e, "media lookup failed; continuing without it");
            report.warnings.push(format!("{label} lookup failed: {e}"));
            None
        }
    };
    MediaAssets {
        logo: find("logo", &names.logo),
        favicon: find("favicon", &names.favicon),
    }
}

/// Per-document failure handling shared by every entity of the phase.
struct EntityPhase<'a> {
    connected: &'a Connected,
    policy: ErrorPolicy,
}

impl EntityPhase<'_> {
    fn seed(
        &self,
        store: &mut dyn ContentStore,
        report: &mut RunReport,
        kind: ContentType,
        key: Option<&str>,
        payload: Result<Map<String, Value>, serde_json::Error>,
    ) -> Result<Option<Upserted>, SeedError> {
        let label = key.unwrap_or(kind.api_id());
        let result = payload
            .map_err(|source| SeedError::Encode {
                kind,
                key: label.to_owned(),
                source,
            })
            .and_then(|data| {
                upsert(store, kind, key, &data).map_err(|source| {
                    SeedError::from_store(&self.connected.target, kind, label, source)
                })
            });
        match result {
            Ok(done) => {
                report.entities.push(done.clone());
                Ok(Some(done))
            }
            Err(e @ SeedError::Connectivity { .. }) => Err(e),
            Err(e) if self.policy == ErrorPolicy::Abort => Err(e),
            Err(e) => {
                warn!(%kind, key = label, error = %e, "document not seeded; continuing");
                report.failures.push(EntityFailure {
                    kind,
                    key: label.to_owned(),
                    error: e.to_string(),
                });
                Ok(None)
            }
        }
    }
}

fn seed_entities(
    connected: &Connected,
    store: &mut dyn ContentStore,
    dataset: &SeedDataset,
    media: &MediaAssets,
    options: &SeedOptions,
    report: &mut RunReport,
) -> Result<SeededEntities, SeedError> {
    let phase = EntityPhase {
        connected,
        policy: options.on_error,
    };
    let mut seeded = SeededEntities::new();

    if let Some(settings) = &dataset.site_settings {
        let payload = settings.payload().map(|mut data| {
            if let Some(logo) = &media.logo {
                data.insert("logo".to_owned(), json!(logo.id));
            }
            if let Some(favicon) = &media.favicon {
                data.insert("favicon".to_owned(), json!(favicon.id));
            }
            data
        });
        phase.seed(store, report, ContentType::SiteSetting, None, payload)?;
    }

    if let Some(footer) = &dataset.footer {
        phase.seed(store, report, ContentType::Footer, None, footer.payload())?;
    }

    for item in &dataset.navigation_items {
        let kind = ContentType::NavigationItem;
        if let Some(done) = phase.seed(store, report, kind, item.natural_key(), item.payload())? {
            seeded.add_navigation(&item.href, done.document_id, item.page.as_deref());
        }
    }

    for page in &dataset.pages {
        let payload = page.payload().map(|mut data| {
            data.entry("locale")
                .or_insert_with(|| json!(options.default_locale.as_str()));
            data
        });
        if let Some(done) = phase.seed(store, report, ContentType::Page, page.natural_key(), payload)? {
            seeded.add_page(&page.slug, done.document_id);
        }
    }

    // Sections go in without their page; the relation phase connects them.
    for (slug, sections) in &dataset.sections {
        for section in sections {
            let anchor = stored_anchor(slug, &section.anchor, options.composite_anchors);
            let payload = section.payload().map(|mut data| {
                data.insert("anchor".to_owned(), Value::String(anchor.clone()));
                data
            });
            if let Some(done) =
                phase.seed(store, report, ContentType::Section, Some(&anchor), payload)?
            {
                seeded.add_section(slug, &anchor, done.document_id);
            }
        }
    }

    Ok(seeded)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Converge `store` to `dataset`.
///
/// Validates the dataset, probes the store, grants public read access,
/// looks up media, upserts every document in dataset order (site settings,
/// footer, navigation, pages, sections), then wires relations.
///
/// # Errors
/// Invalid datasets and connectivity failures always fail the run. A
/// document failure fails it under [`ErrorPolicy::Abort`] and is recorded
/// in [`RunReport::failures`] under [`ErrorPolicy::Continue`].
#[instrument(skip_all, fields(target = %store.target()))]
pub fn run(
    store: &mut dyn ContentStore,
    dataset: &SeedDataset,
    options: &SeedOptions,
) -> Result<RunReport, SeedError> {
    dataset.validate(options.composite_anchors)?;

    let connected = probe(store)?;
    let mut report = RunReport {
        target: connected.target.clone(),
        fingerprint: dataset.fingerprint().to_owned(),
        ..RunReport::default()
    };

    if options.public_read {
        grant_public_read(&connected, store, &mut report);
    }
    let media = lookup_media(&connected, store, &options.media, &mut report);
    report.media = media.clone();

    let seeded = seed_entities(&connected, store, dataset, &media, options, &mut report)?;
    report.relations = wire_relations(store, &seeded, options.relation_strategy);

    info!(
        created = report.count(UpsertAction::Created),
        updated = report.count(UpsertAction::Updated),
        failed = report.failures.len(),
        relation_failures = report.relation_failures(),
        "seed run finished"
    );
    Ok(report)
}

/// Resolve against `store` and report the writes a run would perform,
/// without performing any.
///
/// # Errors
/// Same as [`run`].
pub fn plan(
    store: &dyn ContentStore,
    dataset: &SeedDataset,
    options: &SeedOptions,
) -> Result<RunReport, SeedError> {
    let mut dry = DryRunStore::new(store);
    let mut report = run(&mut dry, dataset, options)?;
    report.dry_run = true;
    report.planned = dry.into_planned();
    Ok(report)
}
