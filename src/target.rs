//! Opening the configured content store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use cms_seed::config::{SeedConfig, TargetKind};
use cms_seed_store::{
    ContentStore, FlagStore, LocalOptions, LocalStore, RestOptions, RestStore, StateFile,
    StoreError,
};
use tracing::warn;

/// Target selection flags shared by every store-facing command.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Content store kind: local or remote
    #[arg(long)]
    pub target: Option<TargetKind>,

    /// Base URL of the remote store
    #[arg(long, env = "CMS_SEED_URL")]
    pub url: Option<String>,

    /// API token for the remote store
    #[arg(long, env = "CMS_SEED_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Store file of the local target
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Deployment environment the run guard is scoped to
    #[arg(long)]
    pub environment: Option<String>,
}

impl TargetArgs {
    /// Overlay the flags onto the file configuration.
    pub fn apply(&self, config: &mut SeedConfig) {
        if let Some(kind) = self.target {
            config.target.kind = kind;
        }
        if let Some(url) = &self.url {
            config.target.base_url.clone_from(url);
        }
        if let Some(path) = &self.local_path {
            config.target.local_path.clone_from(path);
        }
        if let Some(env) = &self.environment {
            config.target.environment.clone_from(env);
        }
    }

    /// The flag value, else the variable named by `[target] token_env`.
    #[must_use]
    pub fn token(&self, config: &SeedConfig) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(&config.target.token_env).ok())
            .filter(|t| !t.is_empty())
    }
}

/// An opened content store plus where its run guard lives.
pub enum Backend {
    /// The local store keeps its flags in the store file.
    Local(LocalStore),
    /// Remote stores have no key/value API; flags go to a state file.
    Remote { store: RestStore, state_path: PathBuf },
}

impl Backend {
    /// Open the store `config` selects. Nothing is sent to a remote store
    /// until the first call.
    ///
    /// # Errors
    /// Fails if the local store file is unreadable or the HTTP client cannot
    /// be built.
    pub fn open(config: &SeedConfig, token: Option<String>) -> Result<Self> {
        match config.target.kind {
            TargetKind::Local => {
                let path = &config.target.local_path;
                let options = LocalOptions {
                    auto_publish: config.target.auto_publish,
                    ..LocalOptions::default()
                };
                let store = LocalStore::open(path, options)
                    .with_context(|| format!("opening local store {}", path.display()))?;
                Ok(Self::Local(store))
            }
            TargetKind::Remote => {
                if token.is_none() {
                    warn!(
                        token_env = %config.target.token_env,
                        "no API token; requests are sent unauthenticated"
                    );
                }
                let store = RestStore::new(RestOptions {
                    base_url: config.target.base_url.clone(),
                    token,
                    timeout: config.target.timeout(),
                })?;
                Ok(Self::Remote {
                    store,
                    state_path: config.guard.state_path.clone(),
                })
            }
        }
    }

    pub fn store(&self) -> &dyn ContentStore {
        match self {
            Self::Local(store) => store,
            Self::Remote { store, .. } => store,
        }
    }

    pub fn store_mut(&mut self) -> &mut dyn ContentStore {
        match self {
            Self::Local(store) => store,
            Self::Remote { store, .. } => store,
        }
    }

    /// Run `f` against this target's flag store.
    ///
    /// # Errors
    /// Propagates flag-store failures, including an unreadable state file.
    pub fn with_flags<T>(
        &mut self,
        f: impl FnOnce(&mut dyn FlagStore) -> Result<T, StoreError>,
    ) -> Result<T> {
        match self {
            Self::Local(store) => Ok(f(store)?),
            Self::Remote { state_path, .. } => {
                let mut file = StateFile::open(state_path)?;
                Ok(f(&mut file)?)
            }
        }
    }

    /// Where the run guard is persisted, for reports.
    #[must_use]
    pub fn flags_location(&self) -> String {
        match self {
            Self::Local(store) => store.target(),
            Self::Remote { state_path, .. } => state_path.display().to_string(),
        }
    }
}
