//! Receipt extraction pipeline

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::ai::parsing::parse_extraction;
use crate::ai::{AIBackend, AIClient, ExtractionResult, ImagePayload};
use crate::error::{Error, Result};
use crate::prompts::{build_extraction_request, PromptId, PromptLibrary};
use crate::reference::ReferenceData;

use super::{invoke, load_prompt, RetryPolicy, SharedPrompts};

/// Shown with every extraction failure so the user can carry on by hand
pub const MANUAL_ENTRY_FALLBACK: &str =
    "We couldn't read this receipt. You can still enter the expense manually.";

/// Turns receipt images into expense candidates
#[derive(Clone)]
pub struct ReceiptScanner {
    client: AIClient,
    prompts: SharedPrompts,
    reference: Arc<ReferenceData>,
    retry: RetryPolicy,
}

impl ReceiptScanner {
    pub fn new(client: AIClient, reference: ReferenceData) -> Self {
        Self {
            client,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
            reference: Arc::new(reference),
            retry: RetryPolicy::none(),
        }
    }

    /// Share a prompt library with other pipelines
    pub fn with_prompts(mut self, prompts: SharedPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reference lists used when the caller does not supply its own
    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Scan against the scanner's own reference lists
    pub async fn scan(&self, image: ImagePayload) -> Result<ExtractionResult> {
        let reference = Arc::clone(&self.reference);
        self.scan_with(image, &reference).await
    }

    /// Scan one image, constraining the result to `reference`.
    ///
    /// Fails with a validation error for an empty or non-image payload
    /// before any model call.
    pub async fn scan_with(
        &self,
        image: ImagePayload,
        reference: &ReferenceData,
    ) -> Result<ExtractionResult> {
        if image.is_empty() {
            return Err(Error::validation("image", "no image data"));
        }
        if !image.media_type.starts_with("image/") {
            return Err(Error::validation(
                "mediaType",
                format!("'{}' is not an image type", image.media_type),
            ));
        }

        let fingerprint = image.fingerprint();
        info!(
            image_sha256 = %fingerprint,
            media_type = %image.media_type,
            bytes = image.len(),
            model = %self.client.model(),
            "Scanning receipt"
        );

        let prompt = load_prompt(&self.prompts, PromptId::ScanReceipt)?;
        let today = chrono::Local::now().date_naive();
        let request = build_extraction_request(&prompt, image, reference, today);

        let result = invoke(&self.client, &request, self.retry, "extraction", |text| {
            parse_extraction(text, reference)
        })
        .await?;

        info!(
            image_sha256 = %fingerprint,
            has_amount = result.amount.is_some(),
            has_date = result.date.is_some(),
            "Receipt scanned"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::ai::MockBackend;
    use crate::error::ErrorKind;

    const ZOMATO: &str = "```json\n{\"name\":\"Zomato order\",\"amount\":450,\"date\":\"2025-03-10\",\"category\":\"Food & Dining\",\"paymentApp\":\"Paytm\",\"bankName\":\"HDFC Bank\"}\n```";

    fn scanner(mock: &MockBackend) -> ReceiptScanner {
        ReceiptScanner::new(AIClient::Mock(mock.clone()), ReferenceData::builtin())
            .with_prompts(Arc::new(RwLock::new(PromptLibrary::embedded_only())))
    }

    fn jpeg() -> ImagePayload {
        ImagePayload::new(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg")
    }

    #[tokio::test]
    async fn test_scan_zomato_receipt() {
        let mock = MockBackend::with_responses([ZOMATO]);
        let result = scanner(&mock).scan(jpeg()).await.unwrap();

        assert_eq!(result.name, "Zomato order");
        assert_eq!(result.amount, Some(450.0));
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2025, 3, 10));
        assert_eq!(result.category, "Food & Dining");
        assert_eq!(result.payment_app, "Paytm");
        assert_eq!(result.bank_name, "HDFC Bank");

        let request = mock.last_request().unwrap();
        assert_eq!(request.image.unwrap().media_type, "image/jpeg");
        assert!(request.instruction.contains("\"HDFC Bank\""));
    }

    #[tokio::test]
    async fn test_scan_refusal_is_parse_error() {
        let mock = MockBackend::with_responses(["Sorry, I cannot process this image."]);
        let err = scanner(&mock).scan(jpeg()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        assert!(err.kind().is_retryable());
    }

    #[tokio::test]
    async fn test_scan_normalizes_out_of_list_values() {
        let mock = MockBackend::with_responses([
            r#"{"name":"Cafe","amount":120,"category":"Coffee","paymentApp":"paytm","bankName":"HDFC Bank"}"#,
        ]);
        let result = scanner(&mock).scan(jpeg()).await.unwrap();

        assert_eq!(result.category, "");
        assert_eq!(result.payment_app, "");
        assert_eq!(result.bank_name, "HDFC Bank");
    }

    #[tokio::test]
    async fn test_scan_with_caller_reference() {
        let mock = MockBackend::with_responses([r#"{"name":"Fuel","category":"Fuel"}"#]);
        let custom = ReferenceData::from_names(&["Fuel"], &["Cash"], &["SBI"]);
        let result = scanner(&mock).scan_with(jpeg(), &custom).await.unwrap();

        assert_eq!(result.category, "Fuel");
        assert!(mock.last_request().unwrap().instruction.contains("\"Fuel\""));
    }

    #[tokio::test]
    async fn test_scan_rejects_empty_image_without_calling_model() {
        let mock = MockBackend::new();
        let err = scanner(&mock)
            .scan(ImagePayload::new(vec![], "image/png"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_scan_rejects_non_image_media_type() {
        let mock = MockBackend::new();
        let err = scanner(&mock)
            .scan(ImagePayload::new(vec![1, 2, 3], "application/pdf"))
            .await
            .unwrap_err();

        match err {
            Error::Validation { field, .. } => assert_eq!(field, "mediaType"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_scan_invocation_failure() {
        let mock = MockBackend::new();
        mock.push_failure("network unreachable");
        let err = scanner(&mock).scan(jpeg()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invocation);
    }

    #[tokio::test]
    async fn test_scan_retries_when_configured() {
        let mock = MockBackend::with_responses(["not json", ZOMATO]);
        let result = scanner(&mock)
            .with_retry(RetryPolicy {
                max_attempts: 2,
                backoff: std::time::Duration::ZERO,
            })
            .scan(jpeg())
            .await
            .unwrap();

        assert_eq!(result.name, "Zomato order");
        assert_eq!(mock.calls(), 2);
    }
}
