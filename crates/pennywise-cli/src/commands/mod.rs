//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - Financial health report from a profile bundle
//! - `config` - Effective model settings
//! - `currency` - Currency conversion commands
//! - `prompts` - Prompt library management commands
//! - `reference` - Reference list display
//! - `scan` - Receipt scanning
//! - `serve` - Web server command
//! - `theme` - Theme preference commands

pub mod analyze;
pub mod config;
pub mod currency;
pub mod prompts;
pub mod reference;
pub mod scan;
pub mod serve;
pub mod theme;

// Re-export command functions for main.rs
pub use analyze::*;
pub use config::*;
pub use currency::*;
pub use prompts::*;
pub use reference::*;
pub use scan::*;
pub use serve::*;
pub use theme::*;

use std::path::Path;

use anyhow::{Context, Result};
use pennywise_core::{ModelSettings, ReferenceData};

/// Resolve model settings from an explicit file or the default locations,
/// then apply environment overrides
pub fn load_settings(path: Option<&Path>) -> Result<ModelSettings> {
    let mut settings = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            ModelSettings::load_from(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => ModelSettings::load().context("Failed to load model settings")?,
    };
    settings.apply_env();
    Ok(settings)
}

/// Reference lists from a JSON file, or the built-in lists
pub fn load_reference(path: Option<&Path>) -> Result<ReferenceData> {
    match path {
        Some(path) => ReferenceData::load(path)
            .with_context(|| format!("Failed to load reference lists from {}", path.display())),
        None => Ok(ReferenceData::builtin()),
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
