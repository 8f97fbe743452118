//! Theme preference commands
//!
//! The CLI is never signed in, so only the local cache is used.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pennywise_core::preferences::{
    default_cache_path, LocalCache, PreferenceStore, Theme, ThemeSource,
};

/// Resolve the cache path from the flag or the data directory
pub fn theme_cache(path: Option<PathBuf>) -> Result<PathBuf> {
    path.or_else(default_cache_path)
        .context("Could not determine the data directory; pass --cache")
}

/// Print the current theme
pub async fn cmd_theme_get(cache: &Path) -> Result<()> {
    let store = PreferenceStore::local_only(LocalCache::new(cache.to_path_buf()));
    let resolved = store.resolve().await;

    let source = match resolved.source {
        ThemeSource::Remote => "profile",
        ThemeSource::Local => "local cache",
        ThemeSource::Default => "default",
    };
    println!("🎨 Theme: {} ({})", resolved.theme, source);

    Ok(())
}

/// Change the theme
pub async fn cmd_theme_set(cache: &Path, theme: &str) -> Result<()> {
    let theme: Theme = theme.parse()?;
    let store = PreferenceStore::local_only(LocalCache::new(cache.to_path_buf()));
    let update = store.set(theme).await?;

    println!("✅ Theme set to {}", update.theme);
    if !update.synced {
        println!("   Saved locally only (not signed in)");
    }

    Ok(())
}
