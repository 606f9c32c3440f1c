//! Upsert: create-if-absent, update-if-present, keyed by natural key.

use cms_seed_store::{ContentStore, ContentType, DocumentId, KeyFilter, StoreError};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use super::publish::{PublishState, ensure_published};
use super::resolve::resolve;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertAction {
    Created,
    Updated,
}

/// Outcome of one document upsert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Upserted {
    pub kind: ContentType,
    /// Natural-key value, or the content type for single types.
    pub key: String,
    pub document_id: DocumentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub action: UpsertAction,
    pub publish: PublishState,
}

/// Reconcile one document with `data`.
///
/// Resolves the existing document by `key` (draft first, then published),
/// partially updates it or creates a new one, then publishes it. A failed
/// publish is reported in [`Upserted::publish`], not returned as an error.
///
/// # Errors
/// Returns the store error of a failed lookup, create or update. Nothing is
/// retried.
pub fn upsert(
    store: &mut dyn ContentStore,
    kind: ContentType,
    key: Option<&str>,
    data: &Map<String, Value>,
) -> Result<Upserted, StoreError> {
    let filter = kind
        .natural_key()
        .zip(key)
        .map(|(field, value)| KeyFilter::eq(field, value));
    let label = key.map_or_else(|| kind.api_id().to_owned(), str::to_owned);

    let (record, action) = match resolve(store, kind, filter.as_ref())? {
        Some(existing) => (
            store.update(kind, &existing.document_id, data)?,
            UpsertAction::Updated,
        ),
        None => (store.create(kind, data)?, UpsertAction::Created),
    };
    let publish = ensure_published(store, kind, &record.document_id);

    info!(
        %kind,
        key = %label,
        document_id = %record.document_id,
        ?action,
        "upserted"
    );
    Ok(Upserted {
        kind,
        key: label,
        document_id: record.document_id,
        id: record.id,
        action,
        publish,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_seed_store::{LocalOptions, LocalStore, Scope};
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn creates_then_updates_same_document() {
        let mut store = LocalStore::in_memory(LocalOptions::default());
        let first = upsert(
            &mut store,
            ContentType::Page,
            Some("about"),
            &data(json!({"slug": "about", "title": "About"})),
        )
        .unwrap();
        assert_eq!(first.action, UpsertAction::Created);
        assert_eq!(first.publish, PublishState::Published);

        let second = upsert(
            &mut store,
            ContentType::Page,
            Some("about"),
            &data(json!({"slug": "about", "title": "About us"})),
        )
        .unwrap();
        assert_eq!(second.action, UpsertAction::Updated);
        assert_eq!(second.document_id, first.document_id);
        assert_eq!(store.document_count(ContentType::Page), 1);

        let filter = KeyFilter::eq("slug", "about");
        let published = store
            .find(ContentType::Page, Some(&filter), Scope::Published, 1)
            .unwrap();
        assert_eq!(published[0].str_field("title"), Some("About us"));
    }

    #[test]
    fn update_leaves_unmentioned_fields() {
        let mut store = LocalStore::in_memory(LocalOptions::default());
        upsert(
            &mut store,
            ContentType::NavigationItem,
            Some("/blog"),
            &data(json!({"href": "/blog", "label": "Blog", "ariaLabel": "Read the blog"})),
        )
        .unwrap();
        upsert(
            &mut store,
            ContentType::NavigationItem,
            Some("/blog"),
            &data(json!({"href": "/blog", "label": "Journal"})),
        )
        .unwrap();
        let filter = KeyFilter::eq("href", "/blog");
        let rec = &store
            .find(ContentType::NavigationItem, Some(&filter), Scope::Draft, 1)
            .unwrap()[0];
        assert_eq!(rec.str_field("label"), Some("Journal"));
        assert_eq!(rec.str_field("ariaLabel"), Some("Read the blog"));
    }

    #[test]
    fn single_type_is_never_duplicated() {
        let mut store = LocalStore::in_memory(LocalOptions::default());
        for name in ["OpenHR", "OpenHR SaaS"] {
            let done = upsert(
                &mut store,
                ContentType::SiteSetting,
                None,
                &data(json!({"siteName": name})),
            )
            .unwrap();
            assert_eq!(done.key, "site-setting");
        }
        assert_eq!(store.document_count(ContentType::SiteSetting), 1);
    }

    #[test]
    fn rejected_write_is_an_error() {
        let mut store = LocalStore::in_memory(LocalOptions::default());
        upsert(
            &mut store,
            ContentType::Section,
            Some("a"),
            &data(json!({"anchor": "a"})),
        )
        .unwrap();
        // Resolves by "b" but writes anchor "a": the store refuses.
        let err = upsert(
            &mut store,
            ContentType::Section,
            Some("b"),
            &data(json!({"anchor": "a"})),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
    }
}
