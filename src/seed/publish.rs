//! Publish-state management.
//!
//! Publishing is best effort: a document that stays in draft is preferable
//! to aborting a run halfway, so every failure is logged and reported
//! instead of returned.

use cms_seed_store::{ContentStore, ContentType, DocumentId, PublishOutcome};
use serde::Serialize;
use tracing::{debug, warn};

/// What happened when a document was published.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "kebab-case")]
pub enum PublishState {
    Published,
    /// The store had already published this revision (auto-publish).
    AlreadyPublished,
    /// The publish call failed; the document may only exist as a draft.
    Failed(String),
}

impl PublishState {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Make sure document `id` is publicly visible. Never fails.
pub fn ensure_published(
    store: &mut dyn ContentStore,
    kind: ContentType,
    id: &DocumentId,
) -> PublishState {
    match store.publish(kind, id) {
        Ok(PublishOutcome::Published) => {
            debug!(%kind, document_id = %id, "published");
            PublishState::Published
        }
        Ok(PublishOutcome::AlreadyPublished) => {
            debug!(%kind, document_id = %id, "already published");
            PublishState::AlreadyPublished
        }
        Err(e) => {
            warn!(%kind, document_id = %id, error = %e, "publish failed; document left as draft");
            PublishState::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_seed_store::{LocalOptions, LocalStore};
    use serde_json::json;

    #[test]
    fn publish_then_already_published() {
        let mut store = LocalStore::in_memory(LocalOptions::default());
        let rec = store
            .create(
                ContentType::Page,
                json!({"slug": "home"}).as_object().unwrap(),
            )
            .unwrap();
        assert_eq!(
            ensure_published(&mut store, ContentType::Page, &rec.document_id),
            PublishState::Published
        );
        assert_eq!(
            ensure_published(&mut store, ContentType::Page, &rec.document_id),
            PublishState::AlreadyPublished
        );
    }

    #[test]
    fn failure_is_swallowed() {
        let mut store = LocalStore::in_memory(LocalOptions::default());
        let ghost = DocumentId::new("ghost").unwrap();
        let state = ensure_published(&mut store, ContentType::Page, &ghost);
        assert!(state.is_failed());
    }

    #[test]
    fn serializes_with_state_tag() {
        assert_eq!(
            serde_json::to_value(PublishState::AlreadyPublished).unwrap(),
            json!({"state": "already-published"})
        );
        assert_eq!(
            serde_json::to_value(PublishState::Failed("boom".to_owned())).unwrap(),
            json!({"state": "failed", "error": "boom"})
        );
    }
}
