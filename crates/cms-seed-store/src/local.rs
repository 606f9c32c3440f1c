//! In-process document store.
//!
//! [`LocalStore`] is the ORM-style backend: documents live in memory and,
//! when opened from a path, are persisted as pretty JSON after every write.
//! Each write is atomic (write-to-temp + fsync + rename) so an interrupted
//! seed never leaves a truncated store file behind.
//!
//! The store models the behaviour the seed engine has to cope with:
//!
//! - draft and published revisions per document, with an optional
//!   auto-publish mode where every write also publishes;
//! - single types holding at most one document;
//! - unique natural keys (`href`, `slug`, `anchor`), so a second page's
//!   `intro` section is rejected unless anchors are page-qualified;
//! - the bidirectional `page.sections` / `section.page` relation and the
//!   one-way `navigation-item.page` relation;
//! - a media library, public-role permissions and per-environment flags.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::{ContentStore, FlagStore};
use crate::types::{ContentType, DocumentId, KeyFilter, MediaRef, PublishOutcome, Record, Scope};

const DOCUMENT_ID_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Behaviour switches for a [`LocalStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalOptions {
    /// Publish on every create/update (no separate draft state).
    pub auto_publish: bool,
    /// Reject writes that would duplicate a natural key.
    pub enforce_unique: bool,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            auto_publish: false,
            enforce_unique: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    next_row_id: u64,
    /// Keyed by content-type api id.
    #[serde(default)]
    documents: BTreeMap<String, Vec<Document>>,
    #[serde(default)]
    media: Vec<MediaRef>,
    #[serde(default)]
    public_permissions: BTreeSet<String>,
    #[serde(default)]
    flags: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    document_id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    draft: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published: Option<Revision>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Revision {
    id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    const fn revision(&self, scope: Scope) -> Option<&Revision> {
        match scope {
            Scope::Draft => self.draft.as_ref(),
            Scope::Published => self.published.as_ref(),
        }
    }

    fn revisions(&self) -> impl Iterator<Item = &Revision> {
        self.draft.iter().chain(self.published.iter())
    }

    fn revisions_mut(&mut self) -> impl Iterator<Item = &mut Revision> {
        self.draft.iter_mut().chain(self.published.iter_mut())
    }

    fn record(&self, rev: &Revision) -> Record {
        Record {
            document_id: self.document_id.clone(),
            id: Some(rev.id),
            published_at: self
                .published
                .as_ref()
                .and_then(|p| p.published_at.clone()),
            fields: rev.fields.clone(),
        }
    }

    /// The revision writes are applied to, materialising a draft from the
    /// published revision when only that exists.
    fn working_fields(&self) -> Map<String, Value> {
        self.draft
            .as_ref()
            .or(self.published.as_ref())
            .map(|r| r.fields.clone())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

struct RelationDef {
    kind: ContentType,
    field: &'static str,
    target: ContentType,
    many: bool,
    inverse: Option<&'static str>,
}

const RELATIONS: &[RelationDef] = &[
    RelationDef {
        kind: ContentType::Page,
        field: "sections",
        target: ContentType::Section,
        many: true,
        inverse: Some("page"),
    },
    RelationDef {
        kind: ContentType::Section,
        field: "page",
        target: ContentType::Page,
        many: false,
        inverse: Some("sections"),
    },
    RelationDef {
        kind: ContentType::NavigationItem,
        field: "page",
        target: ContentType::Page,
        many: false,
        inverse: None,
    },
];

fn relation(kind: ContentType, field: &str) -> Option<&'static RelationDef> {
    RELATIONS.iter().find(|r| r.kind == kind && r.field == field)
}

// ---------------------------------------------------------------------------
// LocalStore
// ---------------------------------------------------------------------------

/// File-backed (or purely in-memory) document store.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    options: LocalOptions,
    state: StoreState,
}

impl LocalStore {
    /// A store that is never persisted.
    #[must_use]
    pub fn in_memory(options: LocalOptions) -> Self {
        Self {
            path: None,
            options,
            state: StoreState::default(),
        }
    }

    /// Open the store file at `path`. A missing file yields an empty store;
    /// the file is created on the first write.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on read failures and
    /// [`StoreError::Malformed`] if the file is not a valid store.
    pub fn open(path: &Path, options: LocalOptions) -> Result<Self, StoreError> {
        let state = match fs::read_to_string(path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
                    operation: format!("open {}", path.display()),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        Ok(Self {
            path: Some(path.to_owned()),
            options,
            state,
        })
    }

    /// The backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of documents of `kind` (any revision).
    #[must_use]
    pub fn document_count(&self, kind: ContentType) -> usize {
        self.state
            .documents
            .get(kind.api_id())
            .map_or(0, Vec::len)
    }

    /// Register a media-library entry.
    ///
    /// # Errors
    /// Returns an error if the store file cannot be written.
    pub fn add_media(&mut self, name: &str) -> Result<MediaRef, StoreError> {
        let media = MediaRef {
            id: self.next_row_id(),
            name: name.to_owned(),
        };
        self.state.media.push(media.clone());
        self.persist()?;
        Ok(media)
    }

    /// Read as an unauthenticated client would: published revisions only,
    /// and only when the public role holds `find` on `kind`.
    ///
    /// # Errors
    /// Returns [`StoreError::Unauthorized`] (403) without the permission.
    pub fn public_find(
        &self,
        kind: ContentType,
        filter: Option<&KeyFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        let action = format!("{}.find", kind.permission_uid());
        if !self.state.public_permissions.contains(&action) {
            return Err(StoreError::Unauthorized {
                status: 403,
                message: format!("public role may not {action}"),
            });
        }
        self.find(kind, filter, Scope::Published, usize::MAX)
    }

    fn next_row_id(&mut self) -> u64 {
        self.state.next_row_id += 1;
        self.state.next_row_id
    }

    fn new_document_id(&self) -> DocumentId {
        loop {
            let candidate: String = rand::rng()
                .sample_iter(Alphanumeric)
                .take(DOCUMENT_ID_LEN)
                .map(|b| char::from(b).to_ascii_lowercase())
                .collect();
            let taken = self
                .state
                .documents
                .values()
                .flatten()
                .any(|d| d.document_id.as_str() == candidate);
            if !taken && let Ok(id) = DocumentId::new(&candidate) {
                return id;
            }
        }
    }

    fn docs(&self, kind: ContentType) -> &[Document] {
        self.state
            .documents
            .get(kind.api_id())
            .map_or(&[], Vec::as_slice)
    }

    fn position(&self, kind: ContentType, id: &DocumentId) -> Option<usize> {
        if kind.is_single() {
            return if self.docs(kind).is_empty() { None } else { Some(0) };
        }
        self.docs(kind).iter().position(|d| d.document_id == *id)
    }

    fn doc_mut(&mut self, kind: ContentType, index: usize) -> Option<&mut Document> {
        self.state
            .documents
            .get_mut(kind.api_id())
            .and_then(|docs| docs.get_mut(index))
    }

    fn require(&self, kind: ContentType, id: &DocumentId) -> Result<usize, StoreError> {
        self.position(kind, id).ok_or_else(|| StoreError::NotFound {
            message: format!("{kind} document {id}"),
        })
    }

    fn check_unique(
        &self,
        kind: ContentType,
        data: &Map<String, Value>,
        except: Option<&DocumentId>,
        operation: &str,
    ) -> Result<(), StoreError> {
        if !self.options.enforce_unique {
            return Ok(());
        }
        let Some(key) = kind.natural_key() else {
            return Ok(());
        };
        let Some(value) = data.get(key).filter(|v| !v.is_null()) else {
            return Ok(());
        };
        let clash = self
            .docs(kind)
            .iter()
            .filter(|d| Some(&d.document_id) != except)
            .any(|d| d.revisions().any(|r| r.fields.get(key) == Some(value)));
        if clash {
            return Err(StoreError::Rejected {
                operation: operation.to_owned(),
                status: 400,
                message: format!("`{key}` must be unique, {value} is already used"),
            });
        }
        Ok(())
    }

    /// Splits the publish request out of a payload: a non-null `publishedAt`
    /// asks for the write to be published, as does auto-publish mode.
    fn take_publish_request(&self, data: &Map<String, Value>) -> (Map<String, Value>, bool) {
        let mut fields = data.clone();
        let requested = fields
            .remove("publishedAt")
            .is_some_and(|v| !v.is_null());
        (fields, requested || self.options.auto_publish)
    }

    fn publish_at(&mut self, kind: ContentType, index: usize) -> PublishOutcome {
        let row_id = self.next_row_id();
        let now = crate::timestamp();
        let Some(doc) = self.doc_mut(kind, index) else {
            return PublishOutcome::AlreadyPublished;
        };
        let Some(draft) = doc.draft.as_ref() else {
            return PublishOutcome::AlreadyPublished;
        };
        if doc
            .published
            .as_ref()
            .is_some_and(|p| p.fields == draft.fields)
        {
            return PublishOutcome::AlreadyPublished;
        }
        let id = doc.published.as_ref().map_or(row_id, |p| p.id);
        doc.published = Some(Revision {
            id,
            published_at: Some(now),
            fields: draft.fields.clone(),
        });
        PublishOutcome::Published
    }

    fn single_link(&self, kind: ContentType, id: &DocumentId, field: &str) -> Option<DocumentId> {
        let doc = self.docs(kind).get(self.position(kind, id)?)?;
        doc.revisions()
            .find_map(|r| r.fields.get(field).and_then(Value::as_str))
            .and_then(|s| DocumentId::new(s).ok())
    }

    fn link(&mut self, kind: ContentType, id: &DocumentId, def_many: bool, field: &str, target: &DocumentId) {
        let Some(index) = self.position(kind, id) else {
            return;
        };
        let Some(doc) = self.doc_mut(kind, index) else {
            return;
        };
        for rev in doc.revisions_mut() {
            if def_many {
                let entry = rev
                    .fields
                    .entry(field.to_owned())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                if let Value::Array(items) = entry
                    && !items.iter().any(|v| v.as_str() == Some(target.as_str()))
                {
                    items.push(Value::String(target.to_string()));
                }
            } else {
                rev.fields
                    .insert(field.to_owned(), Value::String(target.to_string()));
            }
        }
    }

    fn unlink(&mut self, kind: ContentType, id: &DocumentId, field: &str, target: &DocumentId) {
        let Some(index) = self.position(kind, id) else {
            return;
        };
        let Some(doc) = self.doc_mut(kind, index) else {
            return;
        };
        for rev in doc.revisions_mut() {
            if let Some(Value::Array(items)) = rev.fields.get_mut(field) {
                items.retain(|v| v.as_str() != Some(target.as_str()));
            }
        }
    }

    /// Point `def.field` of `id` at `target`, keeping the inverse side in
    /// step. A to-one side that previously pointed elsewhere is detached
    /// from its old partner first.
    fn attach(&mut self, def: &RelationDef, id: &DocumentId, target: &DocumentId) {
        let inverse = def.inverse.and_then(|f| relation(def.target, f));
        if !def.many
            && let Some(prev) = self.single_link(def.kind, id, def.field)
            && prev != *target
            && let Some(inv) = inverse
        {
            self.unlink(inv.kind, &prev, inv.field, id);
        }
        self.link(def.kind, id, def.many, def.field, target);

        let Some(inv) = inverse else {
            return;
        };
        if !inv.many
            && let Some(prev) = self.single_link(inv.kind, target, inv.field)
            && prev != *id
        {
            self.unlink(def.kind, &prev, def.field, target);
        }
        self.link(inv.kind, target, inv.many, inv.field, id);
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.state).map_err(|e| StoreError::Malformed {
            operation: "serialize local store".to_owned(),
            message: e.to_string(),
        })?;
        crate::write_atomic(path, json.as_bytes())
    }
}

impl ContentStore for LocalStore {
    fn target(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "in-memory store".to_owned(), |p| p.display().to_string())
    }

    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn find(
        &self,
        kind: ContentType,
        filter: Option<&KeyFilter>,
        scope: Scope,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let limit = if kind.is_single() { 1 } else { limit };
        Ok(self
            .docs(kind)
            .iter()
            .filter_map(|d| d.revision(scope).map(|r| (d, r)))
            .filter(|(_, r)| kind.is_single() || filter.is_none_or(|f| f.matches(&r.fields)))
            .take(limit)
            .map(|(d, r)| d.record(r))
            .collect())
    }

    fn create(
        &mut self,
        kind: ContentType,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let operation = format!("create {kind}");
        if kind.is_single() && !self.docs(kind).is_empty() {
            return Err(StoreError::Rejected {
                operation,
                status: 400,
                message: format!("single type {kind} already has a document"),
            });
        }
        self.check_unique(kind, data, None, &operation)?;
        let (fields, publish) = self.take_publish_request(data);

        let document_id = self.new_document_id();
        let row_id = self.next_row_id();
        let doc = Document {
            document_id,
            draft: Some(Revision {
                id: row_id,
                published_at: None,
                fields,
            }),
            published: None,
        };
        let docs = self
            .state
            .documents
            .entry(kind.api_id().to_owned())
            .or_default();
        docs.push(doc);
        let index = docs.len() - 1;
        if publish {
            self.publish_at(kind, index);
        }
        self.persist()?;

        let doc = &self.docs(kind)[index];
        let rev = doc.draft.as_ref().ok_or_else(|| StoreError::NotFound {
            message: format!("{kind} draft after create"),
        })?;
        Ok(doc.record(rev))
    }

    fn update(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let operation = format!("update {kind}");
        let index = self.require(kind, id)?;
        let current = self.docs(kind)[index].document_id.clone();
        self.check_unique(kind, data, Some(&current), &operation)?;
        let (patch, publish) = self.take_publish_request(data);

        let row_id = self.next_row_id();
        let Some(doc) = self.doc_mut(kind, index) else {
            return Err(StoreError::NotFound {
                message: format!("{kind} document {id}"),
            });
        };
        let mut fields = doc.working_fields();
        for (key, value) in patch {
            fields.insert(key, value);
        }
        match doc.draft.as_mut() {
            Some(draft) => draft.fields = fields,
            None => {
                doc.draft = Some(Revision {
                    id: row_id,
                    published_at: None,
                    fields,
                });
            }
        }
        if publish {
            self.publish_at(kind, index);
        }
        self.persist()?;

        let doc = &self.docs(kind)[index];
        let rev = doc.draft.as_ref().ok_or_else(|| StoreError::NotFound {
            message: format!("{kind} draft after update"),
        })?;
        Ok(doc.record(rev))
    }

    fn publish(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
    ) -> Result<PublishOutcome, StoreError> {
        let index = self.require(kind, id)?;
        let outcome = self.publish_at(kind, index);
        if outcome == PublishOutcome::Published {
            self.persist()?;
        }
        Ok(outcome)
    }

    fn connect(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        field: &str,
        targets: &[DocumentId],
    ) -> Result<(), StoreError> {
        let def = relation(kind, field).ok_or_else(|| StoreError::UnknownRelation {
            kind: kind.to_string(),
            field: field.to_owned(),
        })?;
        let index = self.require(kind, id)?;
        let id = self.docs(kind)[index].document_id.clone();
        if !def.many && targets.len() != 1 {
            return Err(StoreError::Rejected {
                operation: format!("connect {kind}.{field}"),
                status: 400,
                message: format!("to-one relation takes exactly one target, got {}", targets.len()),
            });
        }
        for target in targets {
            self.require(def.target, target)?;
        }
        for target in targets {
            self.attach(def, &id, target);
        }
        self.persist()
    }

    fn find_media(&self, name: &str) -> Result<Option<MediaRef>, StoreError> {
        let needle = name.to_lowercase();
        Ok(self
            .state
            .media
            .iter()
            .find(|m| m.name.to_lowercase().contains(&needle))
            .cloned())
    }

    fn grant_public_read(
        &mut self,
        kind: ContentType,
        actions: &[&str],
    ) -> Result<usize, StoreError> {
        let uid = kind.permission_uid();
        let created = actions
            .iter()
            .filter(|action| {
                self.state
                    .public_permissions
                    .insert(format!("{uid}.{action}"))
            })
            .count();
        if created > 0 {
            self.persist()?;
        }
        Ok(created)
    }

    fn missing_public_read(
        &self,
        kind: ContentType,
        actions: &[&str],
    ) -> Result<Vec<String>, StoreError> {
        let uid = kind.permission_uid();
        Ok(actions
            .iter()
            .filter(|action| {
                !self
                    .state
                    .public_permissions
                    .contains(&format!("{uid}.{action}"))
            })
            .map(|&action| action.to_owned())
            .collect())
    }
}

impl FlagStore for LocalStore {
    fn read_flag(&self, environment: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .state
            .flags
            .get(environment)
            .and_then(|flags| flags.get(key))
            .cloned())
    }

    fn write_flag(&mut self, environment: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.state
            .flags
            .entry(environment.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        self.persist()
    }

    fn clear_flag(&mut self, environment: &str, key: &str) -> Result<bool, StoreError> {
        let removed = self
            .state
            .flags
            .get_mut(environment)
            .and_then(|flags| flags.remove(key))
            .is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }
}

/// Write `bytes` to `path` atomically: temp file in the same directory,
/// fsync, rename over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_owned(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "store".into(), |n| n.to_string_lossy().into_owned());
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
}
