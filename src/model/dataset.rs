//! The seed dataset: the declarative source of truth a run converges to.
//!
//! ```json
//! {
//!   "siteSettings": { ... },
//!   "footer": { ... },
//!   "navigationItems": [ ... ],
//!   "pages": [ ... ],
//!   "sections": { "<page slug>": [ ... ] }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::check::{Checker, Violation};
use super::entities::{Footer, NavigationItem, Page, Section, SiteSettings};

/// Errors from loading or validating a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset file could not be read.
    #[error("cannot read dataset {}: {source}\n  To fix: check the path, or set `seed.dataset` in cms-seed.toml.", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dataset is not valid JSON or does not match the record types.
    #[error("dataset {origin} is not valid: {source}")]
    Parse {
        /// File path or `"<inline>"`.
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// The dataset parsed but breaks one or more content rules.
    #[error("dataset has {} problem(s):\n{}", .0.len(), render(.0))]
    Invalid(Vec<Violation>),
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for b in result.iter() {
        use std::fmt::Write as _;
        let _ = write!(hex, "{b:02x}");
    }
    hex
}

/// Stored anchor for a section: `<pageSlug>-<localAnchor>` when composite
/// anchors are enabled, the local anchor otherwise.
#[must_use]
pub fn stored_anchor(page_slug: &str, local_anchor: &str, composite: bool) -> String {
    if composite {
        format!("{page_slug}-{local_anchor}")
    } else {
        local_anchor.to_owned()
    }
}

/// Parsed seed dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_settings: Option<SiteSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
    #[serde(default)]
    pub navigation_items: Vec<NavigationItem>,
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Sections grouped by owning page slug, in file order.
    #[serde(default)]
    pub sections: IndexMap<String, Vec<Section>>,
    #[serde(skip)]
    fingerprint: String,
}

impl SeedDataset {
    /// Read and parse the dataset at `path`.
    ///
    /// # Errors
    /// Returns [`DatasetError::Read`] or [`DatasetError::Parse`].
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse a dataset from JSON text.
    ///
    /// # Errors
    /// Returns [`DatasetError::Parse`] on malformed JSON or unknown fields.
    pub fn from_json(text: &str) -> Result<Self, DatasetError> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, DatasetError> {
        let parse_err = |source| DatasetError::Parse {
            origin: origin.to_owned(),
            source,
        };
        let mut dataset: Self = serde_json::from_str(text).map_err(parse_err)?;
        // Fingerprint the canonical form (sorted keys, no whitespace) so
        // formatting changes do not look like content changes.
        let canonical: Value = serde_json::from_str(text).map_err(parse_err)?;
        let bytes = serde_json::to_vec(&canonical).map_err(parse_err)?;
        dataset.fingerprint = sha256_hex(&bytes);
        Ok(dataset)
    }

    /// SHA-256 of the canonical dataset JSON (hex). Empty for datasets built
    /// in code rather than parsed.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Sections of `page_slug`, in file order.
    #[must_use]
    pub fn sections_for(&self, page_slug: &str) -> &[Section] {
        self.sections.get(page_slug).map_or(&[], Vec::as_slice)
    }

    /// Total number of documents a run would reconcile.
    #[must_use]
    pub fn document_count(&self) -> usize {
        usize::from(self.site_settings.is_some())
            + usize::from(self.footer.is_some())
            + self.navigation_items.len()
            + self.pages.len()
            + self.sections.values().map(Vec::len).sum::<usize>()
    }

    /// Every content-rule violation in the dataset.
    #[must_use]
    pub fn violations(&self, composite_anchors: bool) -> Vec<Violation> {
        let mut checker = Checker::new();

        if let Some(settings) = &self.site_settings {
            settings.check("siteSettings", &mut checker);
        }
        if let Some(footer) = &self.footer {
            footer.check("footer", &mut checker);
        }

        let mut hrefs: HashMap<&str, usize> = HashMap::new();
        for (i, item) in self.navigation_items.iter().enumerate() {
            let path = format!("navigationItems[{i}]");
            item.check(&path, &mut checker);
            if let Some(first) = hrefs.insert(&item.href, i) {
                checker.push(
                    format!("{path}.href"),
                    format!("`{}` duplicates navigationItems[{first}]", item.href),
                );
            }
        }

        let mut slugs: HashMap<&str, usize> = HashMap::new();
        for (i, page) in self.pages.iter().enumerate() {
            let path = format!("pages[{i}]");
            page.check(&path, &mut checker);
            if let Some(first) = slugs.insert(&page.slug, i) {
                checker.push(
                    format!("{path}.slug"),
                    format!("`{}` duplicates pages[{first}]", page.slug),
                );
            }
        }

        for (i, item) in self.navigation_items.iter().enumerate() {
            if let Some(slug) = &item.page
                && !slugs.contains_key(slug.as_str())
            {
                checker.push(
                    format!("navigationItems[{i}].page"),
                    format!("no page with slug `{slug}`"),
                );
            }
        }

        let mut stored: HashMap<String, String> = HashMap::new();
        for (slug, sections) in &self.sections {
            if !slugs.contains_key(slug.as_str()) {
                checker.push(
                    format!("sections.{slug}"),
                    format!("no page with slug `{slug}`"),
                );
            }
            let mut local: HashMap<&str, usize> = HashMap::new();
            for (j, section) in sections.iter().enumerate() {
                let path = format!("sections.{slug}[{j}]");
                section.check(&path, &mut checker);
                if let Some(first) = local.insert(&section.anchor, j) {
                    checker.push(
                        format!("{path}.anchor"),
                        format!("`{}` duplicates sections.{slug}[{first}]", section.anchor),
                    );
                    continue;
                }
                let anchor = stored_anchor(slug, &section.anchor, composite_anchors);
                if let Some(other) = stored.insert(anchor.clone(), path.clone()) {
                    checker.push(
                        format!("{path}.anchor"),
                        format!("stored anchor `{anchor}` collides with {other}"),
                    );
                }
            }
        }

        checker.finish()
    }

    /// Fail with every violation if the dataset breaks any content rule.
    ///
    /// # Errors
    /// Returns [`DatasetError::Invalid`] listing all violations.
    pub fn validate(&self, composite_anchors: bool) -> Result<(), DatasetError> {
        let violations = self.violations(composite_anchors);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(DatasetError::Invalid(violations))
        }
    }
}
