//! Seed configuration (`cms-seed.toml`).
//!
//! Every field has a default; a missing file means all defaults. Command
//! line flags override file values in the binary. The API token never lives
//! in the file: `[target] token_env` names the environment variable that
//! holds it.
//!
//! ```toml
//! [target]
//! kind = "remote"
//! base_url = "https://cms.example.com"
//! environment = "production"
//!
//! [seed]
//! dataset = "data/seed-data.json"
//! relation_strategy = "inverse"
//! on_error = "abort"
//!
//! [media]
//! logo = "openhr-mark-full-open"
//!
//! [guard]
//! enabled = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, de};

use crate::model::LocaleCode;
use crate::seed::guard::DEFAULT_KEY;
use crate::seed::{ErrorPolicy, MediaNames, RelationStrategy, SeedOptions};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cms-seed.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level seed configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedConfig {
    /// Which content store to seed.
    #[serde(default)]
    pub target: TargetConfig,

    /// Dataset location and reconciliation behaviour.
    #[serde(default)]
    pub seed: SeedSection,

    /// Media-library names attached to the site settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// Run-once guard.
    #[serde(default)]
    pub guard: GuardConfig,
}

// ---------------------------------------------------------------------------
// TargetConfig
// ---------------------------------------------------------------------------

/// The kind of content store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// In-process store persisted to a JSON file.
    #[default]
    Local,
    /// Hosted store reached over its REST API.
    Remote,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(format!("invalid target '{s}'. Use: local or remote")),
        }
    }
}

/// Content-store selection.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub kind: TargetKind,

    /// Base URL of the remote store (without `/api`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the remote API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Store file of the local target.
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,

    /// Publish every local write immediately (draft-and-publish disabled).
    #[serde(default)]
    pub auto_publish: bool,

    /// Per-request timeout for the remote store. Must be at least 1.
    #[serde(
        default = "default_timeout_seconds",
        deserialize_with = "positive_seconds"
    )]
    pub timeout_seconds: u64,

    /// Deployment environment the run guard is scoped to.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            kind: TargetKind::default(),
            base_url: default_base_url(),
            token_env: default_token_env(),
            local_path: default_local_path(),
            auto_publish: false,
            timeout_seconds: default_timeout_seconds(),
            environment: default_environment(),
        }
    }
}

impl TargetConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_base_url() -> String {
    "http://localhost:1337".to_owned()
}

fn default_token_env() -> String {
    "CMS_SEED_TOKEN".to_owned()
}

fn default_local_path() -> PathBuf {
    PathBuf::from(".cms-seed/store.json")
}

const fn default_timeout_seconds() -> u64 {
    30
}

/// A zero timeout makes every remote request fail immediately.
fn positive_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match u64::deserialize(deserializer)? {
        0 => Err(de::Error::custom("timeout_seconds must be at least 1")),
        secs => Ok(secs),
    }
}

fn default_environment() -> String {
    "development".to_owned()
}

// ---------------------------------------------------------------------------
// SeedSection
// ---------------------------------------------------------------------------

/// Dataset and reconciliation settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedSection {
    /// Path of the seed dataset (JSON).
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,

    /// Store section anchors as `<pageSlug>-<anchor>`.
    #[serde(default = "default_true")]
    pub composite_anchors: bool,

    #[serde(default)]
    pub relation_strategy: RelationStrategy,

    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Locale for pages that do not name one.
    #[serde(default)]
    pub default_locale: LocaleCode,

    /// Grant the public role read access before seeding.
    #[serde(default = "default_true")]
    pub public_read: bool,
}

impl Default for SeedSection {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            composite_anchors: true,
            relation_strategy: RelationStrategy::default(),
            on_error: ErrorPolicy::default(),
            default_locale: LocaleCode::default(),
            public_read: true,
        }
    }
}

fn default_dataset() -> PathBuf {
    PathBuf::from("data/seed-data.json")
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// MediaConfig
// ---------------------------------------------------------------------------

/// Media-library name fragments (case-insensitive substring match).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    #[serde(default = "default_logo")]
    pub logo: String,
    #[serde(default = "default_favicon")]
    pub favicon: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            logo: default_logo(),
            favicon: default_favicon(),
        }
    }
}

fn default_logo() -> String {
    MediaNames::default().logo
}

fn default_favicon() -> String {
    MediaNames::default().favicon
}

// ---------------------------------------------------------------------------
// GuardConfig
// ---------------------------------------------------------------------------

/// Run-once guard settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// When false, `run` always seeds (same as `--force`).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Flag key within the environment.
    #[serde(default = "default_guard_key")]
    pub key: String,

    /// Flag file used for remote targets. Local targets keep the flag in
    /// the store file.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: default_guard_key(),
            state_path: default_state_path(),
        }
    }
}

fn default_guard_key() -> String {
    DEFAULT_KEY.to_owned()
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".cms-seed/state.json")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl SeedConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }

    /// Engine options derived from `[seed]` and `[media]`.
    #[must_use]
    pub fn seed_options(&self) -> SeedOptions {
        SeedOptions {
            composite_anchors: self.seed.composite_anchors,
            relation_strategy: self.seed.relation_strategy,
            on_error: self.seed.on_error,
            default_locale: self.seed.default_locale,
            public_read: self.seed.public_read,
            media: MediaNames {
                logo: self.media.logo.clone(),
                favicon: self.media.favicon.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
