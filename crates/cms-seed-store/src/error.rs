//! Error types for content-store operations.
//!
//! [`StoreError`] is the single error type returned by every
//! [`ContentStore`](crate::ContentStore) and [`FlagStore`](crate::FlagStore)
//! method. Variants separate connectivity problems (which abort a seed run)
//! from per-document rejections (which the caller's error policy decides).

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by content-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (DNS, TCP, TLS, timeout).
    #[error("cannot reach content store at {target}: {message}")]
    Unreachable {
        /// Base URL or path of the store.
        target: String,
        /// Transport-level description.
        message: String,
    },

    /// The store rejected the credentials or the caller lacks permission.
    #[error("content store refused access (HTTP {status}): {message}")]
    Unauthorized {
        /// HTTP status (401/403).
        status: u16,
        /// Message returned by the store.
        message: String,
    },

    /// A referenced document does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },

    /// The store refused a write or query (validation, uniqueness, etc.).
    #[error("{operation} rejected (HTTP {status}): {message}")]
    Rejected {
        /// Operation label, e.g. `"create page"`.
        operation: String,
        /// HTTP status, or the equivalent for the local store.
        status: u16,
        /// Message returned by the store.
        message: String,
    },

    /// The relation attribute is not defined on the content type.
    #[error("relation `{field}` is not defined on {kind}")]
    UnknownRelation {
        /// Content type api id.
        kind: String,
        /// Requested attribute.
        field: String,
    },

    /// A response or persisted value could not be interpreted.
    #[error("malformed data in {operation}: {message}")]
    Malformed {
        /// Operation label.
        operation: String,
        /// What was wrong.
        message: String,
    },

    /// File system error on a local store or state file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// `true` for failures that make every later call pointless
    /// (unreachable store, rejected credentials).
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Unauthorized { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
