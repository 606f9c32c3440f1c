//! The [`ContentStore`] and [`FlagStore`] traits: the boundary between the
//! seed engine and a concrete content backend.
//!
//! | Group       | Methods                                       |
//! |-------------|-----------------------------------------------|
//! | Probe       | `target`, `ping`                              |
//! | Query       | `find`, `find_media`                          |
//! | Command     | `create`, `update`, `publish`, `connect`      |
//! | Access      | `grant_public_read`, `missing_public_read`    |
//! | Flags       | `read_flag`, `write_flag`, `clear_flag`       |

use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::types::{ContentType, DocumentId, KeyFilter, MediaRef, PublishOutcome, Record, Scope};

/// A content store the seed engine can reconcile against.
///
/// Implementations exist for the in-process [`LocalStore`](crate::LocalStore),
/// the hosted [`RestStore`](crate::RestStore), and the recording
/// [`DryRunStore`](crate::DryRunStore) decorator.
///
/// # Object safety
///
/// The trait is object-safe; the engine works with `&mut dyn ContentStore`.
pub trait ContentStore {
    /// Human-readable description of the target (URL or file path).
    fn target(&self) -> String;

    /// Cheap read proving the store is reachable and the credential works.
    fn ping(&self) -> Result<(), StoreError>;

    /// Documents of `kind` matching `filter` in the given revision scope,
    /// in store order, at most `limit` of them.
    ///
    /// For single types `filter` is ignored and at most one record returns.
    fn find(
        &self,
        kind: ContentType,
        filter: Option<&KeyFilter>,
        scope: Scope,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;

    /// Create a document from `data`. Returns the created revision.
    fn create(&mut self, kind: ContentType, data: &Map<String, Value>)
    -> Result<Record, StoreError>;

    /// Partially update a document: attributes absent from `data` are left
    /// untouched. Single types ignore `id`.
    fn update(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        data: &Map<String, Value>,
    ) -> Result<Record, StoreError>;

    /// Move a document into its published state.
    fn publish(&mut self, kind: ContentType, id: &DocumentId)
    -> Result<PublishOutcome, StoreError>;

    /// Add `targets` to the relation attribute `field` of document `id`.
    ///
    /// Connecting an already-connected target is a no-op.
    fn connect(
        &mut self,
        kind: ContentType,
        id: &DocumentId,
        field: &str,
        targets: &[DocumentId],
    ) -> Result<(), StoreError>;

    /// First media-library entry whose name contains `name`
    /// (case-insensitive).
    fn find_media(&self, name: &str) -> Result<Option<MediaRef>, StoreError>;

    /// Grant the public role `actions` (`find`, `findOne`) on `kind`.
    ///
    /// Returns how many grants were newly created; existing grants are left
    /// alone.
    fn grant_public_read(&mut self, kind: ContentType, actions: &[&str])
    -> Result<usize, StoreError>;

    /// The subset of `actions` that [`grant_public_read`] would create.
    ///
    /// Stores that cannot tell report every action as missing.
    ///
    /// [`grant_public_read`]: ContentStore::grant_public_read
    fn missing_public_read(
        &self,
        _kind: ContentType,
        actions: &[&str],
    ) -> Result<Vec<String>, StoreError> {
        Ok(actions.iter().map(|&a| a.to_owned()).collect())
    }
}

/// Persisted key/value flags scoped to a deployment environment.
pub trait FlagStore {
    /// Read flag `key` for `environment`.
    fn read_flag(&self, environment: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Set flag `key` for `environment`, persisting immediately.
    fn write_flag(&mut self, environment: &str, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove flag `key`; returns whether it existed.
    fn clear_flag(&mut self, environment: &str, key: &str) -> Result<bool, StoreError>;
}
