//! Pluggable model backend abstraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: one text-or-vision completion call plus health info
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `MockBackend`
//!
//! Backends only move text. Prompt construction lives in [`crate::prompts`],
//! output checking in [`parsing`], and sequencing in [`crate::pipeline`].
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (gemini, mock). Default: gemini
//! - `GEMINI_API_KEY`: required for the gemini backend

mod gemini;
mod mock;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::ModelSettings;
use crate::error::Result;

/// Trait defining the interface for all model backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send one request and return the raw completion text.
    ///
    /// No retry happens here; that is the orchestrator's call.
    async fn generate(&self, request: &ModelRequest) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Gemini generateContent API
    Gemini(GeminiBackend),
    /// Mock backend for testing and offline development
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `gemini` (default): requires `GEMINI_API_KEY`
    /// - `mock`: canned responses, no network
    ///
    /// Fails with a configuration error when the gemini key is missing.
    pub fn from_env() -> Result<Self> {
        let settings = ModelSettings::load()?;
        Self::from_env_with(settings)
    }

    /// Like [`AIClient::from_env`] but with already-resolved settings
    pub fn from_env_with(settings: ModelSettings) -> Result<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "mock" => Ok(AIClient::Mock(MockBackend::new())),
            "gemini" => {
                GeminiBackend::from_key(std::env::var("GEMINI_API_KEY").ok(), settings)
                    .map(AIClient::Gemini)
            }
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                GeminiBackend::from_key(std::env::var("GEMINI_API_KEY").ok(), settings)
                    .map(AIClient::Gemini)
            }
        }
    }

    /// Create a Gemini backend directly
    pub fn gemini(api_key: &str, settings: ModelSettings) -> Result<Self> {
        GeminiBackend::new(api_key, settings).map(AIClient::Gemini)
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Gemini(b) => AIClient::Gemini(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        match self {
            AIClient::Gemini(b) => b.generate(request).await,
            AIClient::Mock(b) => b.generate(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[test]
    fn test_ai_client_gemini_requires_key() {
        assert!(AIClient::gemini("", ModelSettings::default()).is_err());

        let client = AIClient::gemini("k", ModelSettings::default()).unwrap();
        assert_eq!(client.model(), "gemini-1.5-flash");
        assert_eq!(client.with_model("gemini-1.5-pro").model(), "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }
}
