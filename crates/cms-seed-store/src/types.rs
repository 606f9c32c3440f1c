//! Value types used in [`ContentStore`](crate::ContentStore) signatures.
//!
//! These are store-agnostic: the local document store and the REST client
//! both speak in [`ContentType`], [`DocumentId`], [`Scope`], [`KeyFilter`]
//! and [`Record`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

/// The fixed set of content types the seed process manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// Global site configuration (single type).
    SiteSetting,
    /// Site footer (single type).
    Footer,
    /// Header/footer/mobile menu entry, keyed by `href`.
    NavigationItem,
    /// Routable page, keyed by `slug`.
    Page,
    /// Page building block, keyed by `anchor`.
    Section,
}

impl ContentType {
    /// Every managed content type, in seeding order.
    pub const ALL: [Self; 5] = [
        Self::SiteSetting,
        Self::Footer,
        Self::NavigationItem,
        Self::Page,
        Self::Section,
    ];

    /// Singular API identifier (`navigation-item`).
    #[must_use]
    pub const fn api_id(self) -> &'static str {
        match self {
            Self::SiteSetting => "site-setting",
            Self::Footer => "footer",
            Self::NavigationItem => "navigation-item",
            Self::Page => "page",
            Self::Section => "section",
        }
    }

    /// REST collection path relative to `/api` (`/navigation-items`).
    ///
    /// Single types use their singular id; collections are pluralised.
    #[must_use]
    pub const fn rest_path(self) -> &'static str {
        match self {
            Self::SiteSetting => "/site-setting",
            Self::Footer => "/footer",
            Self::NavigationItem => "/navigation-items",
            Self::Page => "/pages",
            Self::Section => "/sections",
        }
    }

    /// Single types hold at most one document.
    #[must_use]
    pub const fn is_single(self) -> bool {
        matches!(self, Self::SiteSetting | Self::Footer)
    }

    /// The field used to recognise an existing document, if any.
    #[must_use]
    pub const fn natural_key(self) -> Option<&'static str> {
        match self {
            Self::SiteSetting | Self::Footer => None,
            Self::NavigationItem => Some("href"),
            Self::Page => Some("slug"),
            Self::Section => Some("anchor"),
        }
    }

    /// Permission action prefix (`api::page.page`).
    #[must_use]
    pub fn permission_uid(self) -> String {
        let id = self.api_id();
        format!("api::{id}.{id}")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_id())
    }
}

impl FromStr for ContentType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.api_id() == s)
            .ok_or_else(|| StoreError::Malformed {
                operation: "parse content type".to_owned(),
                message: format!("unknown content type `{s}`"),
            })
    }
}

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// A store-assigned stable document identifier.
///
/// Stays the same across draft and published revisions of a document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a `DocumentId`, rejecting values that cannot be embedded in a
    /// URL path segment.
    ///
    /// # Errors
    /// Returns [`StoreError::Malformed`] if the id is empty or contains `/`,
    /// `?`, `#` or whitespace.
    pub fn new(s: &str) -> Result<Self, StoreError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), StoreError> {
        if s.is_empty() || s.chars().any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace()) {
            return Err(StoreError::Malformed {
                operation: "parse document id".to_owned(),
                message: format!("invalid document id `{s}`"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = StoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which revision of a staged document a read targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The working (draft) revision.
    Draft,
    /// The publicly visible revision.
    Published,
}

impl Scope {
    /// Value of the `status` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// KeyFilter
// ---------------------------------------------------------------------------

/// Equality predicate over exactly one field (`slug = "about"`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyFilter {
    field: String,
    value: String,
}

impl KeyFilter {
    /// Build `field = value`.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The filtered field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The expected value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether a JSON field value satisfies this predicate.
    ///
    /// Strings compare verbatim; numbers and booleans compare by their JSON
    /// rendering, mirroring how query-string filters are interpreted.
    #[must_use]
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        match fields.get(&self.field) {
            Some(Value::String(s)) => *s == self.value,
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string() == self.value,
            _ => false,
        }
    }
}

impl fmt::Display for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?}", self.field, self.value)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A document revision as returned by a store.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Stable identifier shared by all revisions.
    pub document_id: DocumentId,
    /// Row id of this revision, when the store exposes one.
    pub id: Option<u64>,
    /// RFC 3339 publish timestamp, `None` for drafts never published.
    pub published_at: Option<String>,
    /// Remaining attributes.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Parse a record from a store's JSON object (`{documentId, id, ...}`).
    ///
    /// # Errors
    /// Returns [`StoreError::Malformed`] if the value is not an object or has
    /// no usable `documentId`.
    pub fn from_json(operation: &str, value: Value) -> Result<Self, StoreError> {
        let Value::Object(mut fields) = value else {
            return Err(StoreError::Malformed {
                operation: operation.to_owned(),
                message: "expected a JSON object".to_owned(),
            });
        };
        let document_id = match fields.remove("documentId") {
            Some(Value::String(s)) => DocumentId::new(&s)?,
            Some(other) => {
                return Err(StoreError::Malformed {
                    operation: operation.to_owned(),
                    message: format!("documentId is not a string: {other}"),
                });
            }
            None => {
                return Err(StoreError::Malformed {
                    operation: operation.to_owned(),
                    message: "response has no documentId".to_owned(),
                });
            }
        };
        let id = fields.remove("id").and_then(|v| v.as_u64());
        let published_at = match fields.remove("publishedAt") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Ok(Self {
            document_id,
            id,
            published_at,
            fields,
        })
    }

    /// Look up a string attribute.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Document ids referenced by a relation attribute.
    ///
    /// Accepts the shapes stores return: a single id string, an array of id
    /// strings, or (populated) objects carrying `documentId`.
    #[must_use]
    pub fn relation_ids(&self, name: &str) -> Option<Vec<String>> {
        fn id_of(v: &Value) -> Option<String> {
            match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("documentId").and_then(Value::as_str).map(str::to_owned),
                _ => None,
            }
        }
        match self.fields.get(name)? {
            Value::Array(items) => Some(items.iter().filter_map(id_of).collect()),
            Value::Null => Some(Vec::new()),
            other => Some(id_of(other).into_iter().collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// PublishOutcome / MediaRef
// ---------------------------------------------------------------------------

/// Result of a publish request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishOutcome {
    /// The store moved the document into its published state.
    Published,
    /// The published revision already matched (auto-publishing stores).
    AlreadyPublished,
}

/// An entry in the store's media library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Numeric media id, used as the attribute value when attaching.
    pub id: u64,
    /// File name as stored.
    pub name: String,
}
