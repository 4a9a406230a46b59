// Local configuration for the editor core.
//
// Global config: `~/.idox/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default autosave debounce window.
const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
const MIN_DEBOUNCE_MS: u64 = 100;
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Default stats panel refresh cadence.
const DEFAULT_STATS_REFRESH_MS: u64 = 2_000;
const MIN_STATS_REFRESH_MS: u64 = 250;
const MAX_STATS_REFRESH_MS: u64 = 60_000;

const DEFAULT_SHARE_BASE_URL: &str = "http://localhost:8080";

/// Root directory for idox local state: `~/.idox/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".idox"))
}

/// Path to the global config file: `~/.idox/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Default location of the anonymous-mode document store.
pub fn default_local_db_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("local.db"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EditorConfig {
    /// Hosted backend connection. Unset means local-only.
    pub backend: BackendConfig,
    /// Stored sign-in. Absent means anonymous mode.
    pub auth: AuthConfig,
    pub autosave: AutosaveConfig,
    pub stats: StatsConfig,
    pub share: ShareConfig,
    pub local: LocalConfig,
}

impl EditorConfig {
    /// Load from `~/.idox/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.idox/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories). The file may
    /// hold an access token, so it is restricted to its owner.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)?;
        restrict_to_owner(path).map_err(ConfigError::Io)
    }

    /// Resolved path of the local store.
    pub fn local_db_path(&self) -> Option<PathBuf> {
        self.local.db_path.clone().or_else(default_local_db_path)
    }
}

/// Hosted backend endpoint and public API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://project.example.co`.
    pub url: Option<String>,
    /// Public (anon) API key sent with every request.
    pub anon_key: Option<String>,
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Debounce window in milliseconds, clamped to [100, 60000].
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: DEFAULT_DEBOUNCE_MS }
    }
}

impl AutosaveConfig {
    pub fn with_millis(ms: u64) -> Self {
        Self { debounce_ms: ms }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    /// Refresh cadence in milliseconds, clamped to [250, 60000].
    pub refresh_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { refresh_ms: DEFAULT_STATS_REFRESH_MS }
    }
}

impl StatsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.clamp(MIN_STATS_REFRESH_MS, MAX_STATS_REFRESH_MS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShareConfig {
    /// Origin that share links are built on: `{base_url}/share/{code}`.
    pub base_url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_SHARE_BASE_URL.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LocalConfig {
    /// Override for the anonymous-mode store (defaults to `~/.idox/local.db`).
    pub db_path: Option<PathBuf>,
}

fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
