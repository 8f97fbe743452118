//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use pennywise_core::ModelSettings;
use pennywise_server::ServerConfig;

use super::load_reference;

pub async fn cmd_serve(
    settings: ModelSettings,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
    references: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Pennywise web server...");
    println!("   Listening: http://{}:{}", host, port);
    println!("   Model: {} ({})", settings.model, settings.base_url);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    if let Some(path) = references {
        println!("   Reference lists: {}", path.display());
    }

    let allowed_origins: Vec<String> = std::env::var("PENNYWISE_CORS_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !allowed_origins.is_empty() {
        println!("   🌐 CORS origins: {}", allowed_origins.join(", "));
    }

    let config = ServerConfig {
        allowed_origins,
        settings,
        reference: load_reference(references)?,
        ..Default::default()
    };

    let static_dir = static_dir.map(|p| p.to_string_lossy().to_string());
    pennywise_server::serve(host, port, static_dir.as_deref(), config)
        .await
        .context("Server failed")
}
