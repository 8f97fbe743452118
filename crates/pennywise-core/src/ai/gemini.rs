//! Gemini backend implementation
//!
//! Talks to the `generateContent` REST endpoint. Generation parameters and
//! safety thresholds come from [`ModelSettings`]; the API key comes from
//! `GEMINI_API_KEY` and is never logged.
//!
//! # Configuration
//!
//! Environment variables:
//! - `GEMINI_API_KEY`: API key (required)
//! - `GEMINI_MODEL`, `GEMINI_BASE_URL`, `PENNYWISE_MODEL_TIMEOUT_SECS`: see [`crate::config`]

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelSettings;
use crate::error::{Error, Result};

use super::types::ModelRequest;
use super::AIBackend;

/// Harm categories that receive the configured blocking threshold
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Finish reasons that mean the completion was withheld
const BLOCKED_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Gemini `generateContent` backend
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    api_key: String,
    settings: ModelSettings,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.settings.model)
            .field("base_url", &self.settings.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// Create a backend. Fails with a configuration error when the key is blank.
    pub fn new(api_key: &str, settings: ModelSettings) -> Result<Self> {
        Self::from_key(Some(api_key.to_string()), settings)
    }

    /// Create from an optional key, as read from the environment
    pub fn from_key(api_key: Option<String>, settings: ModelSettings) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Configuration("GEMINI_API_KEY is not set; AI features are unavailable".into())
            })?;

        Ok(Self {
            http_client: Client::new(),
            api_key,
            settings,
        })
    }

    /// Create from environment variables and the resolved model settings
    pub fn from_env() -> Result<Self> {
        let settings = ModelSettings::load()?;
        Self::from_key(std::env::var("GEMINI_API_KEY").ok(), settings)
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            api_key: self.api_key.clone(),
            settings: self.settings.clone().with_model(model),
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        )
    }

    /// Build the wire request for one model call
    fn build_body<'a>(&self, request: &'a ModelRequest) -> GenerateContentRequest<'a> {
        let mut parts = vec![Part::Text {
            text: &request.instruction,
        }];
        if let Some(image) = &request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: &image.media_type,
                    data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                },
            });
        }

        let threshold = self.settings.safety_threshold.as_str();

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            system_instruction: request.system.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part::Text { text }],
            }),
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                top_k: self.settings.top_k,
                top_p: self.settings.top_p,
                candidate_count: self.settings.candidate_count,
                max_output_tokens: self.settings.max_output_tokens,
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold,
                })
                .collect(),
        }
    }

    async fn send(&self, body: &GenerateContentRequest<'_>) -> Result<String> {
        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(Error::Invocation(format!(
                "Gemini API error {}: {}",
                status, message
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        extract_text(parsed)
    }
}

/// Pull the completion text out of a response, surfacing safety blocks
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(Error::Invocation(format!(
            "request blocked by safety filter ({})",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Invocation("no candidates returned".into()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKED_FINISH_REASONS.iter().any(|r| *r == reason) {
            return Err(Error::Invocation(format!(
                "response withheld by safety filter ({})",
                reason
            )));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok(text)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    /// Base64-encoded bytes
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    candidate_count: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[async_trait]
impl AIBackend for GeminiBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        let body = self.build_body(request);
        debug!(
            model = %self.settings.model,
            has_image = request.image.is_some(),
            "Calling Gemini generateContent"
        );

        match tokio::time::timeout(self.settings.timeout, self.send(&body)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(model = %self.settings.model, timeout_secs = self.settings.timeout.as_secs(), "Gemini call timed out");
                Err(Error::Invocation(format!(
                    "request timed out after {}s",
                    self.settings.timeout.as_secs()
                )))
            }
        }
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models/{}", self.settings.base_url, self.settings.model);
        match self
            .http_client
            .get(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.settings.timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn host(&self) -> &str {
        &self.settings.base_url
    }
}
