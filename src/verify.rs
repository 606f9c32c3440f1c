//! Read-only verification of a store against a dataset.
//!
//! Checks, per document the dataset describes:
//! - single types hold at most one document
//! - each natural key matches exactly one document (draft and published)
//! - each document has a published revision
//! - each page's sections, and each navigation item's page, are connected
//!
//! Nothing is written. A relation the store does not return is a warning,
//! not a failure.

use std::collections::BTreeSet;

use cms_seed_store::{ContentStore, ContentType, DocumentId, KeyFilter, Record, Scope};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::model::{SeedDataset, SeedEntity, stored_anchor};
use crate::seed::pipeline::probe;
use crate::seed::{SeedError, SeedOptions};

/// Outcome of one check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl CheckStatus {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Fail => "[FAIL]",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyReport {
    pub target: String,
    pub checks: Vec<VerifyCheck>,
}

impl VerifyReport {
    /// No check failed. Warnings do not count.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    #[must_use]
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    fn push(&mut self, name: String, status: CheckStatus, message: impl Into<String>) {
        self.checks.push(VerifyCheck {
            name,
            status,
            message: message.into(),
        });
    }
}

struct Verifier<'a> {
    store: &'a dyn ContentStore,
    target: String,
    report: VerifyReport,
}

impl Verifier<'_> {
    /// `find` with connectivity failures escalated and everything else
    /// recorded as a failed check.
    fn find(
        &mut self,
        name: &str,
        kind: ContentType,
        filter: Option<&KeyFilter>,
        scope: Scope,
    ) -> Result<Option<Vec<Record>>, SeedError> {
        match self.store.find(kind, filter, scope, 2) {
            Ok(records) => Ok(Some(records)),
            Err(source) if source.is_connectivity() => Err(SeedError::Connectivity {
                target: self.target.clone(),
                source,
            }),
            Err(e) => {
                self.report
                    .push(name.to_owned(), CheckStatus::Fail, format!("lookup failed: {e}"));
                Ok(None)
            }
        }
    }

    /// Presence, uniqueness and publication of one document. Returns the
    /// draft record when exactly one exists.
    fn document(&mut self, kind: ContentType, key: Option<&str>) -> Result<Option<Record>, SeedError> {
        let filter = kind
            .natural_key()
            .zip(key)
            .map(|(field, value)| KeyFilter::eq(field, value));
        let name = key.map_or_else(|| kind.to_string(), |k| format!("{kind} `{k}`"));

        let Some(mut drafts) = self.find(&name, kind, filter.as_ref(), Scope::Draft)? else {
            return Ok(None);
        };
        let Some(published) = self.find(&name, kind, filter.as_ref(), Scope::Published)? else {
            return Ok(None);
        };
        debug!(%kind, key, drafts = drafts.len(), published = published.len(), "verified");

        match (drafts.len(), published.len()) {
            (0, 0) => {
                self.report.push(name, CheckStatus::Fail, "missing");
                Ok(None)
            }
            (d, p) if d > 1 || p > 1 => {
                self.report
                    .push(name, CheckStatus::Fail, "more than one document for this key");
                Ok(None)
            }
            (_, 0) => {
                self.report
                    .push(name, CheckStatus::Warn, "present but never published");
                Ok(drafts.pop())
            }
            (0, _) => {
                self.report.push(name, CheckStatus::Ok, "published");
                Ok(published.into_iter().next())
            }
            _ => {
                self.report.push(name, CheckStatus::Ok, "present and published");
                Ok(drafts.pop())
            }
        }
    }

    fn page_sections(&mut self, slug: &str, page: &Record, sections: &[(String, Option<Record>)]) {
        let name = format!("page `{slug}` sections");
        let expected: Vec<&DocumentId> = sections
            .iter()
            .filter_map(|(_, r)| r.as_ref().map(|r| &r.document_id))
            .collect();
        if expected.is_empty() {
            return;
        }

        if let Some(ids) = page.relation_ids("sections") {
            let connected: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
            let missing: Vec<&str> = sections
                .iter()
                .filter_map(|(anchor, r)| {
                    r.as_ref()
                        .filter(|r| !connected.contains(r.document_id.as_str()))
                        .map(|_| anchor.as_str())
                })
                .collect();
            if missing.is_empty() {
                self.report.push(
                    name,
                    CheckStatus::Ok,
                    format!("{} section(s) connected", expected.len()),
                );
            } else {
                self.report.push(
                    name,
                    CheckStatus::Fail,
                    format!("not connected: {}", missing.join(", ")),
                );
            }
            return;
        }

        // The store did not return page.sections; fall back to section.page.
        let mut unknown = 0;
        let mut missing = Vec::new();
        for (anchor, record) in sections {
            let Some(record) = record else { continue };
            match record.relation_ids("page") {
                Some(ids) if ids.iter().any(|id| id == page.document_id.as_str()) => {}
                Some(_) => missing.push(anchor.as_str()),
                None => unknown += 1,
            }
        }
        if !missing.is_empty() {
            self.report.push(
                name,
                CheckStatus::Fail,
                format!("not connected: {}", missing.join(", ")),
            );
        } else if unknown > 0 {
            self.report.push(
                name,
                CheckStatus::Warn,
                "store did not return the page/section relation",
            );
        } else {
            self.report.push(
                name,
                CheckStatus::Ok,
                format!("{} section(s) connected", expected.len()),
            );
        }
    }

    fn navigation_page(&mut self, href: &str, item: &Record, slug: &str, page: &DocumentId) {
        let name = format!("navigation-item `{href}` page");
        match item.relation_ids("page") {
            Some(ids) if ids.iter().any(|id| id == page.as_str()) => {
                self.report
                    .push(name, CheckStatus::Ok, format!("linked to `{slug}`"));
            }
            Some(_) => {
                self.report
                    .push(name, CheckStatus::Fail, format!("not linked to `{slug}`"));
            }
            None => {
                self.report.push(
                    name,
                    CheckStatus::Warn,
                    "store did not return the navigation/page relation",
                );
            }
        }
    }
}

/// Check `store` against `dataset` without writing anything.
///
/// # Errors
/// Returns [`SeedError::Connectivity`] when the store cannot be read at all.
/// Every other problem is a failed check in the report.
#[instrument(skip_all, fields(target = %store.target()))]
pub fn verify(
    store: &dyn ContentStore,
    dataset: &SeedDataset,
    options: &SeedOptions,
) -> Result<VerifyReport, SeedError> {
    probe(store)?;
    let target = store.target();
    let mut v = Verifier {
        store,
        target: target.clone(),
        report: VerifyReport {
            target,
            checks: Vec::new(),
        },
    };

    if dataset.site_settings.is_some() {
        v.document(ContentType::SiteSetting, None)?;
    }
    if dataset.footer.is_some() {
        v.document(ContentType::Footer, None)?;
    }

    let mut pages = Vec::new();
    for page in &dataset.pages {
        let record = v.document(ContentType::Page, page.natural_key())?;
        pages.push((page.slug.as_str(), record));
    }

    for (slug, sections) in &dataset.sections {
        let mut seen = Vec::new();
        for section in sections {
            let anchor = stored_anchor(slug, &section.anchor, options.composite_anchors);
            let record = v.document(ContentType::Section, Some(&anchor))?;
            seen.push((anchor, record));
        }
        if let Some((_, Some(page))) = pages.iter().find(|(s, _)| *s == slug.as_str()) {
            v.page_sections(slug, page, &seen);
        }
    }

    for item in &dataset.navigation_items {
        let record = v.document(ContentType::NavigationItem, item.natural_key())?;
        if let (Some(record), Some(slug)) = (record, &item.page)
            && let Some((_, Some(page))) = pages.iter().find(|(s, _)| *s == slug.as_str())
        {
            v.navigation_page(&item.href, &record, slug, &page.document_id);
        }
    }

    Ok(v.report)
}
