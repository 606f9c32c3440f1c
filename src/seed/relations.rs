//! Relation wiring.
//!
//! Runs strictly after every document exists: the only way to get a
//! [`SeededEntities`] is from the entity phase of the pipeline. Failures are
//! logged and reported per relation; they never abort a run.
//!
//! A connect writes the draft revision on stores with draft and publish, so
//! the owner is published again after every successful connect. Stores that
//! already carry the link in the published revision answer
//! [`PublishState::AlreadyPublished`].

use std::slice;

use cms_seed_store::{ContentStore, ContentType, DocumentId, StoreError};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use super::RelationStrategy;
use super::publish::{PublishState, ensure_published};

#[derive(Clone, Debug, PartialEq, Eq)]
struct SeededSection {
    anchor: String,
    document_id: DocumentId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SeededNavigation {
    href: String,
    document_id: DocumentId,
    page: Option<String>,
}

/// Natural key to document id correspondences built by one entity phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeededEntities {
    pages: IndexMap<String, DocumentId>,
    sections: IndexMap<String, Vec<SeededSection>>,
    navigation: Vec<SeededNavigation>,
}

impl SeededEntities {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn add_page(&mut self, slug: &str, id: DocumentId) {
        self.pages.insert(slug.to_owned(), id);
    }

    pub(super) fn add_section(&mut self, page_slug: &str, anchor: &str, id: DocumentId) {
        self.sections
            .entry(page_slug.to_owned())
            .or_default()
            .push(SeededSection {
                anchor: anchor.to_owned(),
                document_id: id,
            });
    }

    pub(super) fn add_navigation(&mut self, href: &str, id: DocumentId, page: Option<&str>) {
        self.navigation.push(SeededNavigation {
            href: href.to_owned(),
            document_id: id,
            page: page.map(str::to_owned),
        });
    }

    /// Document id of the page seeded under `slug`.
    #[must_use]
    pub fn page(&self, slug: &str) -> Option<&DocumentId> {
        self.pages.get(slug)
    }

    /// Document ids of the sections seeded for `slug`, in dataset order.
    #[must_use]
    pub fn sections_of(&self, slug: &str) -> Vec<DocumentId> {
        self.sections
            .get(slug)
            .map(|s| s.iter().map(|s| s.document_id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Outcome of wiring one relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationResult {
    /// Content type whose attribute was written.
    pub kind: ContentType,
    /// Natural key of the owning document.
    pub owner: String,
    pub field: String,
    /// Number of documents connected.
    pub targets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Republish of the owner after a successful connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishState>,
}

impl RelationResult {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The connect succeeded but the owner could not be republished.
    #[must_use]
    pub const fn publish_failed(&self) -> bool {
        matches!(self.publish, Some(PublishState::Failed(_)))
    }
}

/// Connect `child_ids` to the relation `field` of `parent_id`.
///
/// Connecting already-connected children is a no-op, so repeated runs
/// converge on exactly the given child set.
///
/// # Errors
/// Returns the store error; callers decide whether it is fatal.
pub fn connect(
    store: &mut dyn ContentStore,
    parent_kind: ContentType,
    parent_id: &DocumentId,
    child_ids: &[DocumentId],
    field: &str,
) -> Result<(), StoreError> {
    if child_ids.is_empty() {
        return Ok(());
    }
    store.connect(parent_kind, parent_id, field, child_ids)
}

fn link(
    store: &mut dyn ContentStore,
    kind: ContentType,
    owner: &str,
    id: &DocumentId,
    field: &str,
    targets: &[DocumentId],
) -> RelationResult {
    let (error, publish) = match connect(store, kind, id, targets, field) {
        Ok(()) => {
            info!(%kind, owner, field, targets = targets.len(), "connected");
            (None, Some(ensure_published(store, kind, id)))
        }
        Err(e) => {
            warn!(%kind, owner, field, error = %e, "relation not wired; continuing");
            (Some(e.to_string()), None)
        }
    };
    RelationResult {
        kind,
        owner: owner.to_owned(),
        field: field.to_owned(),
        targets: targets.len(),
        error,
        publish,
    }
}

fn skipped(kind: ContentType, owner: &str, field: &str, targets: usize, page: &str) -> RelationResult {
    let error = format!("page `{page}` was not seeded");
    warn!(%kind, owner, field, "{error}; relation skipped");
    RelationResult {
        kind,
        owner: owner.to_owned(),
        field: field.to_owned(),
        targets,
        error: Some(error),
        publish: None,
    }
}

/// Wire page/section and navigation/page relations for everything seeded.
///
/// With [`RelationStrategy::Inverse`] each page gets one `sections` connect
/// listing all its sections; with [`RelationStrategy::Forward`] every
/// section's `page` is set individually.
pub fn wire_relations(
    store: &mut dyn ContentStore,
    seeded: &SeededEntities,
    strategy: RelationStrategy,
) -> Vec<RelationResult> {
    let mut results = Vec::new();

    for (slug, sections) in &seeded.sections {
        if sections.is_empty() {
            continue;
        }
        let Some(page_id) = seeded.pages.get(slug) else {
            results.push(skipped(ContentType::Page, slug, "sections", sections.len(), slug));
            continue;
        };
        match strategy {
            RelationStrategy::Inverse => {
                let ids: Vec<DocumentId> =
                    sections.iter().map(|s| s.document_id.clone()).collect();
                results.push(link(store, ContentType::Page, slug, page_id, "sections", &ids));
            }
            RelationStrategy::Forward => {
                for section in sections {
                    results.push(link(
                        store,
                        ContentType::Section,
                        &section.anchor,
                        &section.document_id,
                        "page",
                        slice::from_ref(page_id),
                    ));
                }
            }
        }
    }

    for item in &seeded.navigation {
        let Some(slug) = &item.page else {
            continue;
        };
        match seeded.pages.get(slug) {
            Some(page_id) => results.push(link(
                store,
                ContentType::NavigationItem,
                &item.href,
                &item.document_id,
                "page",
                slice::from_ref(page_id),
            )),
            None => results.push(skipped(ContentType::NavigationItem, &item.href, "page", 1, slug)),
        }
    }

    results
}
