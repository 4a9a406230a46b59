// Wiring for commands that touch documents: config, session, and the
// identity-routed store.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use idox_editor::autosave::{SaveEvent, SaveScheduler};
use idox_editor::config::EditorConfig;
use idox_editor::service::DocumentService;
use idox_editor::session::Session;
use idox_editor::store::{LocalStore, RestStore, RoutedStore};
use tokio::sync::mpsc;
use tracing::debug;

pub type CliStore = Arc<RoutedStore<RestStore, LocalStore>>;

pub struct EditorContext {
    pub config: EditorConfig,
    pub config_path: Option<std::path::PathBuf>,
    pub session: Arc<Session>,
    pub store: CliStore,
}

impl EditorContext {
    /// Load config (explicit path, else `~/.idox/config.toml`) and open stores.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        let db_path =
            config.local_db_path().context("could not determine local store location")?;
        let local = LocalStore::open(&db_path)?;
        let anonymous_id = local.anonymous_id()?;
        let session =
            Arc::new(Session::from_auth_config(&config.auth).with_anonymous_id(anonymous_id));

        let remote = match config.backend.url.as_deref() {
            Some(url) if config.backend.is_configured() => {
                let anon_key = config.backend.anon_key.clone().unwrap_or_default();
                Some(RestStore::new(url, anon_key, Arc::clone(&session))?)
            }
            _ => None,
        };
        debug!(
            remote = remote.is_some(),
            authenticated = session.is_authenticated(),
            local = %db_path.display(),
            "editor context ready"
        );

        let store = Arc::new(RoutedStore::with_optional_remote(remote, local, Arc::clone(&session)));
        Ok(Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
            session,
            store,
        })
    }

    pub fn service(&self) -> DocumentService<CliStore> {
        DocumentService::new(Arc::clone(&self.store), Arc::clone(&self.session), &self.config.share)
    }

    pub fn scheduler(&self) -> (SaveScheduler<CliStore>, mpsc::UnboundedReceiver<SaveEvent>) {
        SaveScheduler::new(Arc::clone(&self.store), &self.config.autosave)
    }
}

pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<EditorConfig> {
    match config_path {
        Some(path) => EditorConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EditorConfig::load()),
    }
}

/// Persist `config` where it was loaded from.
pub fn save_config(config: &EditorConfig, config_path: Option<&Path>) -> anyhow::Result<()> {
    match config_path {
        Some(path) => config
            .save_to(path)
            .with_context(|| format!("failed to write config to {}", path.display())),
        None => config.save().context("failed to write ~/.idox/config.toml"),
    }
}
