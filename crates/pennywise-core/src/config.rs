//! Model settings
//!
//! Settings are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/pennywise/config/model.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Environment variables are applied on top of whichever file was used:
//! - `GEMINI_MODEL`: model name
//! - `GEMINI_BASE_URL`: API base URL (useful for proxies and tests)
//! - `PENNYWISE_MODEL_TIMEOUT_SECS`: per-call timeout
//!
//! The API key is deliberately not part of these settings; see
//! [`crate::ai::GeminiBackend::from_env`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/model.toml");

/// Highest temperature accepted for extraction and analysis calls
pub const MAX_TEMPERATURE: f32 = 0.3;

/// Content-safety blocking threshold applied to every harm category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl SafetyThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockNone => "BLOCK_NONE",
            Self::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            Self::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            Self::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }

    /// At least as strict as `BLOCK_MEDIUM_AND_ABOVE`
    pub fn is_at_least_medium(&self) -> bool {
        matches!(self, Self::BlockMediumAndAbove | Self::BlockLowAndAbove)
    }
}

/// Generation and pipeline settings shared by every model call.
///
/// Read-only after construction; clone it freely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSettings {
    /// Model name (e.g. "gemini-1.5-flash")
    pub model: String,
    /// API base URL without trailing slash
    pub base_url: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub candidate_count: u32,
    pub max_output_tokens: u32,
    pub safety_threshold: SafetyThreshold,
    /// Upper bound for a single model call
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Attempts per orchestrator run (1 = no retry)
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub retry_backoff: Duration,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.1,
            top_k: 1,
            top_p: 1.0,
            candidate_count: 1,
            max_output_tokens: 2048,
            safety_threshold: SafetyThreshold::BlockMediumAndAbove,
            timeout: Duration::from_secs(60),
            max_attempts: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl ModelSettings {
    /// Load settings from the default override location (or embedded defaults),
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = load_config(default_config_path().as_deref())?;
        settings.apply_env();
        Ok(settings)
    }

    /// Load settings from an explicit file, falling back to embedded defaults
    /// when the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse settings from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Apply `GEMINI_MODEL`, `GEMINI_BASE_URL` and `PENNYWISE_MODEL_TIMEOUT_SECS`
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(secs) = std::env::var("PENNYWISE_MODEL_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) if s > 0 => self.timeout = Duration::from_secs(s),
                _ => tracing::warn!(value = %secs, "Ignoring invalid PENNYWISE_MODEL_TIMEOUT_SECS"),
            }
        }
    }

    /// Builder-style model override
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Builder-style base URL override
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Builder-style timeout override
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("pennywise").join("config").join("model.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<ModelSettings> {
    let content = match override_path {
        Some(path) if path.exists() => fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    model: Option<RawModel>,
    generation: Option<RawGeneration>,
    safety: Option<RawSafety>,
    pipeline: Option<RawPipeline>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    name: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGeneration {
    temperature: Option<f32>,
    top_k: Option<u32>,
    top_p: Option<f32>,
    candidate_count: Option<u32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawSafety {
    threshold: Option<SafetyThreshold>,
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<ModelSettings> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Configuration(format!("Invalid config TOML: {}", e)))?;

    let mut settings = ModelSettings::default();

    if let Some(model) = raw.model {
        if let Some(name) = model.name {
            settings.model = name;
        }
        if let Some(url) = model.base_url {
            settings.base_url = url.trim_end_matches('/').to_string();
        }
    }

    if let Some(generation) = raw.generation {
        if let Some(t) = generation.temperature {
            settings.temperature = t;
        }
        if let Some(k) = generation.top_k {
            settings.top_k = k;
        }
        if let Some(p) = generation.top_p {
            settings.top_p = p;
        }
        if let Some(c) = generation.candidate_count {
            settings.candidate_count = c;
        }
        if let Some(m) = generation.max_output_tokens {
            settings.max_output_tokens = m;
        }
    }

    if let Some(threshold) = raw.safety.and_then(|s| s.threshold) {
        settings.safety_threshold = threshold;
    }

    if let Some(pipeline) = raw.pipeline {
        if let Some(secs) = pipeline.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = pipeline.max_attempts {
            settings.max_attempts = attempts;
        }
        if let Some(ms) = pipeline.retry_backoff_ms {
            settings.retry_backoff = Duration::from_millis(ms);
        }
    }

    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &ModelSettings) -> Result<()> {
    if settings.model.trim().is_empty() {
        return Err(Error::Configuration("model name must not be empty".into()));
    }
    if !(0.0..=MAX_TEMPERATURE).contains(&settings.temperature) {
        return Err(Error::Configuration(format!(
            "temperature {} outside 0.0-{}",
            settings.temperature, MAX_TEMPERATURE
        )));
    }
    if settings.top_k != 1 {
        return Err(Error::Configuration(format!(
            "top_k must be 1, got {}",
            settings.top_k
        )));
    }
    if settings.candidate_count != 1 {
        return Err(Error::Configuration(format!(
            "candidate_count must be 1, got {}",
            settings.candidate_count
        )));
    }
    if settings.max_output_tokens == 0 {
        return Err(Error::Configuration("max_output_tokens must be positive".into()));
    }
    if !settings.safety_threshold.is_at_least_medium() {
        return Err(Error::Configuration(format!(
            "safety threshold {} is weaker than BLOCK_MEDIUM_AND_ABOVE",
            settings.safety_threshold.as_str()
        )));
    }
    if settings.timeout.is_zero() {
        return Err(Error::Configuration("timeout_secs must be positive".into()));
    }
    if settings.max_attempts == 0 {
        return Err(Error::Configuration("max_attempts must be at least 1".into()));
    }
    Ok(())
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_parses() {
        let settings = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(settings.model, "gemini-1.5-flash");
        assert_eq!(settings.top_k, 1);
        assert_eq!(settings.candidate_count, 1);
        assert_eq!(
            settings.safety_threshold,
            SafetyThreshold::BlockMediumAndAbove
        );
        assert_eq!(settings.max_attempts, 1);
        assert!(settings.temperature < 0.5);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let settings = parse_config(
            r#"
[model]
name = "gemini-1.5-pro"

[pipeline]
timeout_secs = 15
"#,
        )
        .unwrap();
        assert_eq!(settings.model, "gemini-1.5-pro");
        assert_eq!(settings.timeout, Duration::from_secs(15));
        assert_eq!(settings.max_output_tokens, 2048);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config("[pipeline]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = parse_config("[generation]\ntemperature = 5.0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = parse_config("[safety]\nthreshold = \"BLOCK_EVERYTHING\"\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_fixed_call_settings_cannot_be_loosened() {
        for toml in [
            "[safety]\nthreshold = \"BLOCK_NONE\"\n",
            "[safety]\nthreshold = \"BLOCK_ONLY_HIGH\"\n",
            "[generation]\ntemperature = 1.9\n",
            "[generation]\ncandidate_count = 4\n",
            "[generation]\ntop_k = 40\n",
        ] {
            let err = ModelSettings::from_toml(toml).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "accepted {:?}", toml);
        }
    }

    #[test]
    fn test_stricter_safety_and_low_temperature_allowed() {
        let settings = parse_config(
            "[safety]\nthreshold = \"BLOCK_LOW_AND_ABOVE\"\n[generation]\ntemperature = 0.3\n",
        )
        .unwrap();
        assert_eq!(settings.safety_threshold, SafetyThreshold::BlockLowAndAbove);
        assert_eq!(settings.temperature, MAX_TEMPERATURE);
    }

    #[test]
    fn test_load_from_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        fs::write(&path, "[model]\nbase_url = \"http://localhost:9999/v1beta/\"\n").unwrap();

        let settings = ModelSettings::load_from(&path).unwrap();
        assert_eq!(settings.base_url, "http://localhost:9999/v1beta");
    }

    #[test]
    fn test_load_from_missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ModelSettings::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings, parse_config(DEFAULT_CONFIG).unwrap());
    }

    #[test]
    fn test_builders() {
        let settings = ModelSettings::default()
            .with_model("gemini-2.0-flash")
            .with_base_url("http://127.0.0.1:1234/")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(settings.model, "gemini-2.0-flash");
        assert_eq!(settings.base_url, "http://127.0.0.1:1234");
        assert_eq!(settings.timeout, Duration::from_secs(3));
    }
}
