//! Pipeline orchestrators
//!
//! Each orchestrator runs build request → call model → strip fences →
//! parse → validate for one pipeline. Whatever goes wrong along the way is
//! folded into the [`ErrorKind`](crate::error::ErrorKind) taxonomy before it
//! leaves this module.

mod analysis;
mod extraction;

pub use analysis::{FinancialAnalyzer, MIN_EXPENSE_RECORDS};
pub use extraction::{ReceiptScanner, MANUAL_ENTRY_FALLBACK};

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::ai::{AIBackend, AIClient, ModelRequest};
use crate::config::ModelSettings;
use crate::error::{Error, Result};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// How many times an orchestrator calls the model before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: settings.retry_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Shared prompt library handle
pub type SharedPrompts = Arc<RwLock<PromptLibrary>>;

/// Clone a prompt out of the shared library
fn load_prompt(prompts: &SharedPrompts, id: PromptId) -> Result<Prompt> {
    let mut library = prompts
        .write()
        .map_err(|_| Error::Configuration("prompt library lock poisoned".into()))?;
    library
        .get(id)
        .cloned()
        .map_err(|e| Error::Configuration(format!("prompt '{}' unavailable: {}", id.as_str(), e)))
}

/// Call the model and parse its reply, retrying retryable failures.
///
/// Every error that escapes has already been through
/// [`Error::into_pipeline`].
async fn invoke<T, F>(
    client: &AIClient,
    request: &ModelRequest,
    retry: RetryPolicy,
    pipeline: &'static str,
    parse: F,
) -> Result<T>
where
    F: Fn(&str) -> Result<T>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = match client.generate(request).await {
            Ok(text) => {
                debug!(pipeline, attempt, len = text.len(), "Model replied");
                parse(&text)
            }
            Err(e) => Err(e),
        }
        .map_err(Error::into_pipeline);

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                let kind = err.kind();
                warn!(
                    pipeline,
                    attempt,
                    model = %client.model(),
                    kind = kind.as_str(),
                    error = %err,
                    "Pipeline attempt failed"
                );
                if !kind.is_retryable() || attempt >= max_attempts {
                    return Err(err);
                }
            }
        }

        attempt += 1;
        if !retry.backoff.is_zero() {
            tokio::time::sleep(retry.backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    #[test]
    fn test_retry_policy_from_settings() {
        let mut settings = ModelSettings::default();
        settings.max_attempts = 3;
        settings.retry_backoff = Duration::from_millis(10);

        let policy = RetryPolicy::from_settings(&settings);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(10));
        assert_eq!(RetryPolicy::default().max_attempts, 1);
    }

    #[tokio::test]
    async fn test_invoke_retries_retryable_errors() {
        let mock = MockBackend::new();
        mock.push_failure("503 unavailable");
        mock.push_response("42");
        let client = AIClient::Mock(mock.clone());

        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::ZERO,
        };
        let value: u32 = invoke(&client, &ModelRequest::text("x"), policy, "test", |t| {
            t.trim()
                .parse()
                .map_err(|_| Error::MalformedOutput(t.to_string()))
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_invoke_single_attempt_by_default() {
        let mock = MockBackend::new();
        mock.push_failure("quota");
        let client = AIClient::Mock(mock.clone());

        let err = invoke(
            &client,
            &ModelRequest::text("x"),
            RetryPolicy::none(),
            "test",
            |t| Ok(t.to_string()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Invocation(_)));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_invoke_does_not_retry_configuration_errors() {
        let mock = MockBackend::with_responses(["anything"]);
        let client = AIClient::Mock(mock.clone());
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Duration::ZERO,
        };

        let err = invoke::<(), _>(&client, &ModelRequest::text("x"), policy, "test", |_| {
            Err(Error::Configuration("bad".into()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_invoke_folds_plumbing_errors() {
        let client = AIClient::Mock(MockBackend::with_responses(["not json"]));
        let err = invoke(
            &client,
            &ModelRequest::text("x"),
            RetryPolicy::none(),
            "test",
            |t| serde_json::from_str::<serde_json::Value>(t).map_err(Error::from),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::MalformedOutput(_)));
    }
}
