//! File-backed flag storage for stores that have none of their own.
//!
//! The REST API offers no place to remember "the seed already ran", so the
//! run-once marker for remote targets lives in a small JSON file:
//!
//! ```json
//! { "environments": { "production": { "initHasRun": { "attemptedAt": "..." } } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::store::FlagStore;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct FlagFile {
    #[serde(default)]
    environments: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Flags persisted in a standalone JSON file.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    contents: FlagFile,
}

impl StateFile {
    /// Load `path`; a missing file starts empty.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on read failures and
    /// [`StoreError::Malformed`] if the file is not valid JSON.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let contents = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| StoreError::Malformed {
                operation: format!("read {}", path.display()),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FlagFile::default(),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        Ok(Self {
            path: path.to_owned(),
            contents,
        })
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let json =
            serde_json::to_string_pretty(&self.contents).map_err(|e| StoreError::Malformed {
                operation: "serialize state file".to_owned(),
                message: e.to_string(),
            })?;
        crate::write_atomic(&self.path, json.as_bytes())
    }
}

impl FlagStore for StateFile {
    fn read_flag(&self, environment: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .contents
            .environments
            .get(environment)
            .and_then(|flags| flags.get(key))
            .cloned())
    }

    fn write_flag(&mut self, environment: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.contents
            .environments
            .entry(environment.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        self.save()
    }

    fn clear_flag(&mut self, environment: &str, key: &str) -> Result<bool, StoreError> {
        let Some(flags) = self.contents.environments.get_mut(environment) else {
            return Ok(false);
        };
        if flags.remove(key).is_none() {
            return Ok(false);
        }
        if flags.is_empty() {
            self.contents.environments.remove(environment);
        }
        self.save()?;
        Ok(true)
    }
}
