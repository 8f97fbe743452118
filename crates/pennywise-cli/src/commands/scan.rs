//! Receipt scanning command

use std::path::Path;

use anyhow::{Context, Result};
use pennywise_core::ai::media_type_for_extension;
use pennywise_core::pipeline::{ReceiptScanner, RetryPolicy};
use pennywise_core::{
    AIBackend, AIClient, ExtractionResult, ImagePayload, ModelSettings, Pipeline,
};

use super::load_reference;

/// Read an image file, inferring its media type from the extension
pub fn read_image(path: &Path) -> Result<ImagePayload> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let media_type = media_type_for_extension(ext).with_context(|| {
        format!(
            "Unsupported image type '{}' (use jpg, jpeg, png, webp, heic or heif)",
            ext
        )
    })?;

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("Image file is empty: {}", path.display());
    }

    Ok(ImagePayload::new(bytes, media_type))
}

/// Scan one receipt with an already-built client
pub async fn scan_receipt(
    client: AIClient,
    settings: &ModelSettings,
    image: &Path,
    references: Option<&Path>,
) -> Result<ExtractionResult> {
    let payload = read_image(image)?;
    let reference = load_reference(references)?;

    let scanner =
        ReceiptScanner::new(client, reference).with_retry(RetryPolicy::from_settings(settings));

    scanner
        .scan(payload)
        .await
        .map_err(|e| anyhow::anyhow!("{}\n({})", e.user_message_in(Pipeline::Extraction), e))
}

/// Scan a receipt image and print the extracted expense
pub async fn cmd_scan(
    settings: ModelSettings,
    image: &Path,
    references: Option<&Path>,
    json: bool,
) -> Result<()> {
    let client = AIClient::from_env_with(settings.clone())?;

    if !json {
        println!("🧾 Scanning {} with {}...\n", image.display(), client.model());
    }

    let result = scan_receipt(client, &settings, image, references).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_extraction(&result);
    Ok(())
}

fn print_extraction(result: &ExtractionResult) {
    let or_dash = |s: &str| {
        if s.is_empty() {
            "-".to_string()
        } else {
            s.to_string()
        }
    };

    println!("  Name:        {}", or_dash(&result.name));
    println!(
        "  Amount:      {}",
        result
            .amount
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Date:        {}",
        result
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Category:    {}", or_dash(&result.category));
    println!("  Payment app: {}", or_dash(&result.payment_app));
    println!("  Bank:        {}", or_dash(&result.bank_name));
    println!();
    println!("✅ Review the fields above before saving the expense.");
}
