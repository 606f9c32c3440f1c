//! Entity resolution: find the document that already holds a natural key.

use cms_seed_store::{ContentStore, ContentType, KeyFilter, Record, Scope, StoreError};
use tracing::warn;

/// Look up `filter` in one revision scope.
///
/// Returns at most one record. When the store holds several matches (a
/// uniqueness violation from an earlier, buggier run) the first in store
/// order wins and a warning is logged.
///
/// # Errors
/// Propagates store failures.
pub fn resolve_in(
    store: &dyn ContentStore,
    kind: ContentType,
    filter: Option<&KeyFilter>,
    scope: Scope,
) -> Result<Option<Record>, StoreError> {
    let found = store.find(kind, filter, scope, 2)?;
    if found.len() > 1 {
        warn!(
            %kind,
            %scope,
            filter = ?filter,
            document_id = %found[0].document_id,
            "several documents match; using the first"
        );
    }
    Ok(found.into_iter().next())
}

/// Find the existing document for `filter`, trying the draft revision first
/// and falling back to the published one.
///
/// Updating whichever revision exists keeps a run from creating a published
/// twin of a draft-only document. `filter` is ignored for single types.
///
/// # Errors
/// Propagates store failures.
pub fn resolve(
    store: &dyn ContentStore,
    kind: ContentType,
    filter: Option<&KeyFilter>,
) -> Result<Option<Record>, StoreError> {
    if let Some(record) = resolve_in(store, kind, filter, Scope::Draft)? {
        return Ok(Some(record));
    }
    resolve_in(store, kind, filter, Scope::Published)
}
