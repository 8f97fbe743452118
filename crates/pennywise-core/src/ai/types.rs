//! AI request and result types
//!
//! These types are backend-agnostic and used across all AI implementations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Image bytes plus the declared media type
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    /// e.g. "image/jpeg"
    pub media_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// SHA-256 of the image bytes, used to identify receipts in logs
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Guess an image media type from a file extension
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// A fully-built request ready to send to a model backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    /// Optional system instruction
    pub system: Option<String>,
    /// The user instruction
    pub instruction: String,
    /// Inline image part (extraction only)
    pub image: Option<ImagePayload>,
}

impl ModelRequest {
    pub fn text(instruction: impl Into<String>) -> Self {
        Self {
            system: None,
            instruction: instruction.into(),
            image: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = if system.trim().is_empty() {
            None
        } else {
            Some(system)
        };
        self
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }
}

/// Expense candidate read from a receipt.
///
/// Constrained fields are either empty or an exact member of the reference
/// list that was supplied with the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub name: String,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub category: String,
    pub payment_app: String,
    pub bank_name: String,
}

/// Priority tier of an action item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// A recommended action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

/// Display band for a health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    /// Score above 75
    Favorable,
    /// Score above 50
    Neutral,
    Caution,
}

impl HealthBand {
    pub fn for_score(score: u8) -> Self {
        if score > 75 {
            Self::Favorable
        } else if score > 50 {
            Self::Neutral
        } else {
            Self::Caution
        }
    }
}

/// Financial health report produced by the analysis pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Always within 0..=100
    pub health_score: u8,
    pub score_justification: String,
    pub observations: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub positive_reinforcement: String,
    pub risk_assessment: String,
}

impl AnalysisReport {
    pub fn band(&self) -> HealthBand {
        HealthBand::for_score(self.health_score)
    }
}
