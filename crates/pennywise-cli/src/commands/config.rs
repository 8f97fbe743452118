//! Config command implementation

use std::path::Path;

use anyhow::Result;
use pennywise_core::config::default_config_path;

use super::load_settings;

/// Print the effective model settings. The API key is never printed.
pub fn cmd_config(path: Option<&Path>) -> Result<()> {
    let settings = load_settings(path)?;

    let source = match path {
        Some(p) => p.display().to_string(),
        None => match default_config_path() {
            Some(p) if p.exists() => p.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };

    let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());
    let key_status = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => "✅ set",
        _ => "❌ not set",
    };

    println!("Model settings ({})\n", source);
    println!("  Backend:           {}", backend);
    println!("  GEMINI_API_KEY:    {}", key_status);
    println!("  Model:             {}", settings.model);
    println!("  Base URL:          {}", settings.base_url);
    println!("  Temperature:       {}", settings.temperature);
    println!("  Top-k:             {}", settings.top_k);
    println!("  Top-p:             {}", settings.top_p);
    println!("  Candidates:        {}", settings.candidate_count);
    println!("  Max output tokens: {}", settings.max_output_tokens);
    println!("  Safety threshold:  {}", settings.safety_threshold.as_str());
    println!("  Timeout:           {}s", settings.timeout.as_secs());
    println!("  Max attempts:      {}", settings.max_attempts);
    println!("  Retry backoff:     {}ms", settings.retry_backoff.as_millis());

    println!();
    println!(
        "Override file: {}",
        default_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );

    Ok(())
}
