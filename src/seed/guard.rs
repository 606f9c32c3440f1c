//! Run-once guard.
//!
//! A persisted flag, scoped to the deployment environment, that stops a
//! store from being reseeded automatically. The flag is written *before*
//! the run starts, so a run that fails halfway is not retried by the next
//! boot either; an operator re-runs with `--force` or clears the flag.
//!
//! Seeding is a single-operator action. Two concurrent first runs can both
//! see the flag unset; no locking is attempted.

use cms_seed_store::{FlagStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Default flag key.
pub const DEFAULT_KEY: &str = "initHasRun";

/// What the flag records about the run that set it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardRecord {
    /// RFC 3339 time the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_at: Option<String>,
    /// Fingerprint of the dataset that run used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl GuardRecord {
    /// Interpret a stored flag. A bare `true` (older marker format) counts as
    /// set with no details; `false` and `null` count as unset. Any other
    /// value still counts as set, with its details dropped.
    fn from_flag(value: Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Self::default()),
            Value::Bool(false) | Value::Null => None,
            other => Some(serde_json::from_value(other).unwrap_or_else(|e| {
                warn!(error = %e, "run guard record is unreadable; treating the flag as set");
                Self::default()
            })),
        }
    }
}

/// The run-once flag for one environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunGuard {
    environment: String,
    key: String,
}

impl RunGuard {
    #[must_use]
    pub fn new(environment: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            key: key.into(),
        }
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The recorded run, if the flag is set.
    ///
    /// # Errors
    /// Propagates flag-store failures.
    pub fn status(&self, flags: &dyn FlagStore) -> Result<Option<GuardRecord>, StoreError> {
        Ok(flags
            .read_flag(&self.environment, &self.key)?
            .and_then(GuardRecord::from_flag))
    }

    /// `true` the first time it is called for this environment, marking the
    /// flag in the same call; `false` once the flag is set.
    ///
    /// # Errors
    /// Propagates flag-store failures.
    pub fn should_run(&self, flags: &mut dyn FlagStore, fingerprint: &str) -> Result<bool, StoreError> {
        if let Some(record) = self.status(flags)? {
            info!(
                environment = %self.environment,
                attempted_at = record.attempted_at.as_deref().unwrap_or("unknown"),
                "seed already ran; skipping"
            );
            return Ok(false);
        }
        self.mark(flags, fingerprint)?;
        Ok(true)
    }

    /// Set the flag unconditionally (forced runs).
    ///
    /// # Errors
    /// Propagates flag-store failures.
    pub fn mark(&self, flags: &mut dyn FlagStore, fingerprint: &str) -> Result<GuardRecord, StoreError> {
        let record = GuardRecord {
            attempted_at: Some(crate::timestamp()),
            fingerprint: (!fingerprint.is_empty()).then(|| fingerprint.to_owned()),
        };
        let value = serde_json::to_value(&record).map_err(|e| StoreError::Malformed {
            operation: "encode run guard".to_owned(),
            message: e.to_string(),
        })?;
        flags.write_flag(&self.environment, &self.key, value)?;
        Ok(record)
    }

    /// Clear the flag. Returns whether it was set.
    ///
    /// # Errors
    /// Propagates flag-store failures.
    pub fn reset(&self, flags: &mut dyn FlagStore) -> Result<bool, StoreError> {
        flags.clear_flag(&self.environment, &self.key)
    }
}
