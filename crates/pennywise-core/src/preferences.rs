//! Theme preference with a remote profile and a local cache
//!
//! The remote profile is authoritative whenever it answers. The local cache
//! only covers the time before sign-in or while offline, and is updated
//! whenever the remote value is read.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// UI color theme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the operating system
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(Error::validation(
                "theme",
                format!("'{}' is not one of light, dark, system", other),
            )),
        }
    }
}

/// The signed-in user's remote profile
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Stored theme, or None if the profile has none
    async fn load_theme(&self) -> Result<Option<Theme>>;

    async fn save_theme(&self, theme: Theme) -> Result<()>;
}

/// In-process profile store, also used to simulate an unreachable backend
#[derive(Default)]
pub struct InMemoryProfileStore {
    theme: RwLock<Option<Theme>>,
    offline: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theme(theme: Theme) -> Self {
        Self {
            theme: RwLock::new(Some(theme)),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every call fail as if the backend were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Invocation("profile service unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load_theme(&self) -> Result<Option<Theme>> {
        self.check_online()?;
        Ok(*self.theme.read().await)
    }

    async fn save_theme(&self, theme: Theme) -> Result<()> {
        self.check_online()?;
        *self.theme.write().await = Some(theme);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedTheme {
    theme: Theme,
}

/// Theme cached in a small JSON file
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache at the default location, if the platform has a data directory
    pub fn default_location() -> Option<Self> {
        default_cache_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached theme. A missing or unreadable file counts as empty.
    pub fn load(&self) -> Option<Theme> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<CachedTheme>(&content) {
            Ok(cached) => Some(cached.theme),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt theme cache");
                None
            }
        }
    }

    pub fn save(&self, theme: Theme) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&CachedTheme { theme })?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Default theme cache path
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("pennywise").join("theme.json"))
}

/// Where a resolved theme came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSource {
    Remote,
    Local,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedTheme {
    pub theme: Theme,
    pub source: ThemeSource,
}

/// Outcome of changing the theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeUpdate {
    pub theme: Theme,
    /// Whether the remote profile accepted the change
    pub synced: bool,
}

/// Reconciles the remote profile with the local cache
#[derive(Clone)]
pub struct PreferenceStore {
    local: LocalCache,
    remote: Option<Arc<dyn ProfileStore>>,
}

impl PreferenceStore {
    /// Store for a signed-out user: local cache only
    pub fn local_only(local: LocalCache) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// Store for a signed-in user
    pub fn with_remote(local: LocalCache, remote: Arc<dyn ProfileStore>) -> Self {
        Self {
            local,
            remote: Some(remote),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.remote.is_some()
    }

    /// Resolve the theme to display.
    ///
    /// Remote value when present (copied into the local cache), else the
    /// local cache, else [`Theme::System`].
    pub async fn resolve(&self) -> ResolvedTheme {
        if let Some(remote) = &self.remote {
            match remote.load_theme().await {
                Ok(Some(theme)) => {
                    if self.local.load() != Some(theme) {
                        if let Err(e) = self.local.save(theme) {
                            warn!(error = %e, "Failed to refresh local theme cache");
                        }
                    }
                    return ResolvedTheme {
                        theme,
                        source: ThemeSource::Remote,
                    };
                }
                Ok(None) => debug!("Remote profile has no theme"),
                Err(e) => warn!(error = %e, "Remote profile unavailable, using local theme"),
            }
        }

        match self.local.load() {
            Some(theme) => ResolvedTheme {
                theme,
                source: ThemeSource::Local,
            },
            None => ResolvedTheme {
                theme: Theme::default(),
                source: ThemeSource::Default,
            },
        }
    }

    /// Change the theme.
    ///
    /// The local cache is written first and must succeed. A remote failure
    /// is reported through [`ThemeUpdate::synced`] and the local value kept.
    pub async fn set(&self, theme: Theme) -> Result<ThemeUpdate> {
        self.local.save(theme)?;

        let synced = match &self.remote {
            Some(remote) => match remote.save_theme(theme).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, theme = %theme, "Theme saved locally but not synced");
                    false
                }
            },
            None => false,
        };

        Ok(ThemeUpdate { theme, synced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(dir: &tempfile::TempDir) -> LocalCache {
        LocalCache::new(dir.path().join("nested").join("theme.json"))
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!(matches!(
            "sepia".parse::<Theme>().unwrap_err(),
            Error::Validation { .. }
        ));
        assert_eq!(Theme::default(), Theme::System);
    }

    #[test]
    fn test_local_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let local = cache(&dir);
        assert_eq!(local.load(), None);

        local.save(Theme::Light).unwrap();
        assert_eq!(local.load(), Some(Theme::Light));
    }

    #[test]
    fn test_local_cache_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(LocalCache::new(path).load(), None);
    }

    #[tokio::test]
    async fn test_resolve_defaults_to_system() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::local_only(cache(&dir));
        let resolved = store.resolve().await;
        assert_eq!(resolved.theme, Theme::System);
        assert_eq!(resolved.source, ThemeSource::Default);
    }

    #[tokio::test]
    async fn test_remote_wins_and_refreshes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let local = cache(&dir);
        local.save(Theme::Light).unwrap();

        let remote = Arc::new(InMemoryProfileStore::with_theme(Theme::Dark));
        let store = PreferenceStore::with_remote(local.clone(), remote);

        let resolved = store.resolve().await;
        assert_eq!(resolved.theme, Theme::Dark);
        assert_eq!(resolved.source, ThemeSource::Remote);
        assert_eq!(local.load(), Some(Theme::Dark));
    }

    #[tokio::test]
    async fn test_remote_without_theme_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let local = cache(&dir);
        local.save(Theme::Light).unwrap();

        let store = PreferenceStore::with_remote(local, Arc::new(InMemoryProfileStore::new()));
        let resolved = store.resolve().await;
        assert_eq!(resolved.theme, Theme::Light);
        assert_eq!(resolved.source, ThemeSource::Local);
    }

    #[tokio::test]
    async fn test_offline_remote_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let local = cache(&dir);
        local.save(Theme::Dark).unwrap();

        let remote = Arc::new(InMemoryProfileStore::with_theme(Theme::Light));
        remote.set_offline(true);
        let store = PreferenceStore::with_remote(local, remote);

        let resolved = store.resolve().await;
        assert_eq!(resolved.theme, Theme::Dark);
        assert_eq!(resolved.source, ThemeSource::Local);
    }

    #[tokio::test]
    async fn test_set_syncs_remote() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(InMemoryProfileStore::new());
        let store = PreferenceStore::with_remote(cache(&dir), remote.clone());

        let update = store.set(Theme::Dark).await.unwrap();
        assert!(update.synced);
        assert_eq!(remote.load_theme().await.unwrap(), Some(Theme::Dark));
    }

    #[tokio::test]
    async fn test_set_keeps_local_when_remote_fails() {
        let dir = tempfile::tempdir().unwrap();
        let local = cache(&dir);
        let remote = Arc::new(InMemoryProfileStore::new());
        remote.set_offline(true);
        let store = PreferenceStore::with_remote(local.clone(), remote);

        let update = store.set(Theme::Light).await.unwrap();
        assert!(!update.synced);
        assert_eq!(local.load(), Some(Theme::Light));
    }

    #[tokio::test]
    async fn test_set_signed_out_is_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::local_only(cache(&dir));
        let update = store.set(Theme::Dark).await.unwrap();
        assert!(!update.synced);
        assert!(!store.is_signed_in());
        assert_eq!(store.resolve().await.source, ThemeSource::Local);
    }
}
