//! Write-recording decorator.
//!
//! [`DryRunStore`] forwards reads to a real store and records every write as
//! a [`PlannedWrite`] instead of sending it. Creates answer with synthetic
//! `dry-run-N` document ids so later steps (publish, relation wiring) can
//! still be planned against them.
//!
//! A publish is only planned for a document some planned write changed
//! (created, updated to new values, or given a new relation); anything else
//! answers [`PublishOutcome::AlreadyPublished`]. Public-read grants are
//! planned only for actions the store does not already allow.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::ContentStore;
use crate::types::{ContentType, DocumentId, KeyFilter, MediaRef, PublishOutcome, Record, Scope};

/// Kind of write a dry run would have performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannedAction {
    Create,
    Update,
    Publish,
    Connect,
    GrantPublicRead,
}

/// One write a dry run skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedWrite {
    pub action: PlannedAction,
    pub kind: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    /// Short human-readable description (`slug = "about"`, `sections += 3`).
    pub detail: String,
}

/// Read-through, write-recording view over another store.
pub struct DryRunStore<'a, S: ContentStore + ?Sized> {
    inner: &'a S,
    planned: Vec<PlannedWrite>,
    next_synthetic: usize,
    /// Documents whose published revision a planned write would change.
    unpublished: HashSet<(ContentType, DocumentId)>,
}

impl<'a, S: ContentStore + ?Sized> DryRunStore<'a, S> {
    #[must_use]
    pub fn new(inner: &'a S) -> Self {
        Self {
            inner,
            planned: Vec::new(),
            next_synthetic: 0,
            unpublished: HashSet::new(),
        }
    }

    /// Writes recorded so far, in call order.
    #[must_use]
    pub fn planned(&self) -> &[PlannedWrite] {
        &self.planned
    }

    /// Consume the decorator, returning the recorded writes.
    #[must_use]
    pub fn into_planned(self) -> Vec<PlannedWrite> {
        self.planned
    }

    fn record(
        &mut self,
        action: PlannedAction,
        kind: ContentType,
        document_id: Option<&DocumentId>,
        detail: String,
    ) {
        self.planned.push(PlannedWrite {
            action,
            kind,
            document_id: document_id.cloned(),
            detail,
        });
    }

    /// The inner store's published revision of `id`, if there is one.
    fn published(&self, kind: ContentType, id: &DocumentId) -> Result<Option<Record>, StoreError> {
        Ok(self
            .inner
            .find(kind, None, Scope::Published, usize::MAX)?
            .into_iter()
            .find(|r| kind.is_single() || &r.document_id == id))
    }
}

fn describe(kind: ContentType, data: &Map<String, Value>) -> String {
    let key_value = kind
        .natural_key()
        .and_then(|key| data.get(key).map(|v| format!("{key} = {v}")));
    key_value.unwrap_or_else(|| format!("{} attributes", data.len()))
}

impl<S: ContentStore + ?Sized> ContentStore for DryRunStore<'_, S> {
    fn target(&self) -> String {
        format!("{} (dry run)", self.inner.target())
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping()
    }

    fn find(
        &self,
        kind: ContentType,
        filter: Option<&KeyFilter>,
        scope: Scope,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.find(kind, filter, scope, limit)
    }

    fn create(
        &mut self,
        kind: ContentType,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError> {
        self.next_synthetic += 1;
        let document_id = DocumentId::new(&format!("dry-run-{}", self.next_synthetic))?;
        self.unpublished.insert((kind, document_id.clone()));
        self.record(
            PlannedAction::Create,
            kind,
            Some(&document_id),
            describe(kind, data),
        );
        Ok(Record {
            document_id,
            id: None,
            published_at: None,
            fields: data.clone(),
        })
    }

    fn update(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let unchanged = self
            .published(kind, id)?
            .is_some_and(|p| data.iter().all(|(k, v)| p.fields.get(k) == Some(v)));
        if !unchanged {
            self.unpublished.insert((kind, id.clone()));
        }
        self.record(PlannedAction::Update, kind, Some(id), describe(kind, data));
        Ok(Record {
            document_id: id.clone(),
            id: None,
            published_at: None,
            fields: data.clone(),
        })
    }

    fn publish(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
    ) -> Result<PublishOutcome, StoreError> {
        if !self.unpublished.remove(&(kind, id.clone())) {
            return Ok(PublishOutcome::AlreadyPublished);
        }
        self.record(PlannedAction::Publish, kind, Some(id), String::new());
        Ok(PublishOutcome::Published)
    }

    fn connect(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        field: &str,
        targets: &[DocumentId],
    ) -> Result<(), StoreError> {
        let connected = self
            .published(kind, id)?
            .and_then(|p| p.relation_ids(field))
            .is_some_and(|ids| targets.iter().all(|t| ids.iter().any(|i| i == t.as_str())));
        if !connected {
            self.unpublished.insert((kind, id.clone()));
        }
        self.record(
            PlannedAction::Connect,
            kind,
            Some(id),
            format!("{field} += {}", targets.len()),
        );
        Ok(())
    }

    fn find_media(&self, name: &str) -> Result<Option<MediaRef>, StoreError> {
        self.inner.find_media(name)
    }

    fn grant_public_read(
        &mut self,
        kind: ContentType,
        actions: &[&str],
    ) -> Result<usize, StoreError> {
        let missing = self.inner.missing_public_read(kind, actions)?;
        if !missing.is_empty() {
            self.record(PlannedAction::GrantPublicRead, kind, None, missing.join(", "));
        }
        Ok(missing.len())
    }

    fn missing_public_read(
        &self,
        kind: ContentType,
        actions: &[&str],
    ) -> Result<Vec<String>, StoreError> {
        self.inner.missing_public_read(kind, actions)
    }
}
