//! Mock backend for testing
//!
//! Returns canned receipt and analysis responses by default, or a scripted
//! sequence of replies. Counts calls so tests can assert that a pipeline
//! did (or did not) reach the model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::ModelRequest;
use super::AIBackend;

const MOCK_RECEIPT: &str = r#"```json
{"name": "Mock Store", "amount": 499.0, "date": "2025-01-15", "category": "Shopping", "paymentApp": "Google Pay", "bankName": "HDFC Bank"}
```"#;

const MOCK_ANALYSIS: &str = r#"```json
{
  "healthScore": 68,
  "scoreJustification": "Spending is consistent but savings are thin.",
  "observations": ["Food & Dining is the largest category", "Two subscriptions overlap"],
  "actionItems": [
    {"title": "Set a dining budget", "description": "Cap restaurant spending at 15% of income.", "priority": "high"},
    {"title": "Review subscriptions", "description": "Cancel the streaming service you use least.", "priority": "medium"}
  ],
  "positiveReinforcement": "Bills are paid on time every month.",
  "riskAssessment": "An unexpected expense would strain current savings."
}
```"#;

/// One scripted reply
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Invocation(String),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    model: String,
    script: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<ModelRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a mock that answers with these texts in order, then falls back to defaults
    pub fn with_responses<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        let backend = Self::new();
        for response in responses {
            backend.push_response(response);
        }
        backend
    }

    /// Create a new instance with a different model name. Shares the script and counters.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Queue a text reply
    pub fn push_response(&self, text: impl Into<String>) {
        self.push(Reply::Text(text.into()));
    }

    /// Queue an invocation failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Reply::Invocation(message.into()));
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<ModelRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Invocation(message)) => Err(Error::Invocation(message)),
            // Images are receipts; everything else is an analysis
            None if request.image.is_some() => Ok(MOCK_RECEIPT.to_string()),
            None => Ok(MOCK_ANALYSIS.to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::parsing::{parse_analysis, parse_extraction};
    use crate::ai::types::ImagePayload;
    use crate::reference::ReferenceData;

    #[tokio::test]
    async fn test_default_responses_parse() {
        let mock = MockBackend::new();

        let receipt = mock
            .generate(
                &ModelRequest::text("scan").with_image(ImagePayload::new(vec![1], "image/png")),
            )
            .await
            .unwrap();
        let extraction = parse_extraction(&receipt, &ReferenceData::builtin()).unwrap();
        assert_eq!(extraction.name, "Mock Store");
        assert_eq!(extraction.category, "Shopping");

        let analysis = mock.generate(&ModelRequest::text("analyze")).await.unwrap();
        let report = parse_analysis(&analysis).unwrap();
        assert_eq!(report.health_score, 68);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let mock = MockBackend::with_responses(["first", "second"]);
        mock.push_failure("quota exceeded");

        let request = ModelRequest::text("x");
        assert_eq!(mock.generate(&request).await.unwrap(), "first");
        assert_eq!(mock.generate(&request).await.unwrap(), "second");
        assert!(matches!(
            mock.generate(&request).await.unwrap_err(),
            Error::Invocation(_)
        ));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let mock = MockBackend::new();
        let renamed = mock.with_model("mock-pro");
        renamed.generate(&ModelRequest::text("x")).await.unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(renamed.model(), "mock-pro");
        assert_eq!(mock.last_request().unwrap().instruction, "x");
    }

    #[tokio::test]
    async fn test_health() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
