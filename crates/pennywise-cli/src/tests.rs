//! CLI command tests

use std::path::PathBuf;

use pennywise_core::{AIClient, MockBackend, ModelSettings};
use tempfile::TempDir;

use crate::commands::{self, truncate};

fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn bundle_json(count: usize) -> String {
    let expenses: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "name": format!("Expense {}", i),
                "amount": 120.5,
                "date": format!("2025-01-{:02}", i + 1),
                "category": "Transportation"
            })
        })
        .collect();
    serde_json::json!({ "expenses": expenses, "goals": [] }).to_string()
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long merchant name", 10), "a long ...");
    assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
}

#[test]
fn test_load_settings_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "model.toml",
        b"[model]\nname = \"gemini-1.5-pro\"\n\n[pipeline]\nmax_attempts = 2\n",
    );

    let settings = commands::load_settings(Some(&path)).unwrap();
    assert_eq!(settings.max_attempts, 2);
    assert_eq!(settings.top_k, 1);
}

#[test]
fn test_load_settings_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(commands::load_settings(Some(&dir.path().join("nope.toml"))).is_err());
}

#[test]
fn test_load_reference_custom_and_builtin() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "refs.json",
        br#"{"categories": ["Fuel"], "paymentApps": [{"name": "Cash"}], "banks": []}"#,
    );

    let custom = commands::load_reference(Some(&path)).unwrap();
    assert_eq!(custom.categories.len(), 1);
    assert!(custom.banks.is_empty());

    let builtin = commands::load_reference(None).unwrap();
    assert!(!builtin.banks.is_empty());
}

// ========== Scan ==========

#[test]
fn test_read_image_infers_media_type() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "receipt.JPG", &[0xff, 0xd8, 0xff]);

    let image = commands::read_image(&path).unwrap();
    assert_eq!(image.media_type, "image/jpeg");
    assert_eq!(image.len(), 3);
}

#[test]
fn test_read_image_rejects_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "receipt.pdf", b"%PDF");
    assert!(commands::read_image(&path).is_err());
}

#[test]
fn test_read_image_rejects_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "receipt.png", b"");
    assert!(commands::read_image(&path).is_err());
}

#[tokio::test]
async fn test_scan_receipt_with_mock() {
    let dir = TempDir::new().unwrap();
    let image = write_file(&dir, "receipt.png", &[0x89, 0x50, 0x4e, 0x47]);
    let mock = MockBackend::new();

    let result = commands::scan_receipt(
        AIClient::Mock(mock.clone()),
        &ModelSettings::default(),
        &image,
        None,
    )
    .await
    .unwrap();

    assert_eq!(result.name, "Mock Store");
    assert_eq!(result.category, "Shopping");
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_scan_receipt_custom_references_normalize() {
    let dir = TempDir::new().unwrap();
    let image = write_file(&dir, "receipt.webp", &[1, 2, 3]);
    let refs = write_file(
        &dir,
        "refs.json",
        br#"{"categories": ["Fuel"], "paymentApps": ["Cash"], "banks": ["SBI"]}"#,
    );

    // The default mock receipt says "Shopping", which is not in this list
    let result = commands::scan_receipt(
        AIClient::mock(),
        &ModelSettings::default(),
        &image,
        Some(&refs),
    )
    .await
    .unwrap();

    assert_eq!(result.category, "");
    assert_eq!(result.bank_name, "");
}

#[tokio::test]
async fn test_scan_failure_mentions_manual_entry() {
    let dir = TempDir::new().unwrap();
    let image = write_file(&dir, "receipt.jpeg", &[0xff, 0xd8]);
    let mock = MockBackend::with_responses(["Sorry, I cannot process this image."]);

    let err = commands::scan_receipt(
        AIClient::Mock(mock),
        &ModelSettings::default(),
        &image,
        None,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("manually"));
}

// ========== Analyze ==========

#[test]
fn test_load_bundle() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "bundle.json", bundle_json(3).as_bytes());

    let bundle = commands::load_bundle(&path).unwrap();
    assert_eq!(bundle.expense_count(), 3);
}

#[test]
fn test_load_bundle_invalid_json() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "bundle.json", b"{\"expenses\": [");
    assert!(commands::load_bundle(&path).is_err());
}

#[tokio::test]
async fn test_analyze_bundle_with_mock() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "bundle.json", bundle_json(5).as_bytes());
    let bundle = commands::load_bundle(&path).unwrap();

    let report = commands::analyze_bundle(AIClient::mock(), &ModelSettings::default(), &bundle)
        .await
        .unwrap();
    assert_eq!(report.health_score, 68);
    assert_eq!(report.action_items.len(), 2);
}

#[tokio::test]
async fn test_analyze_bundle_insufficient_data() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "bundle.json", bundle_json(2).as_bytes());
    let bundle = commands::load_bundle(&path).unwrap();
    let mock = MockBackend::new();

    let err = commands::analyze_bundle(
        AIClient::Mock(mock.clone()),
        &ModelSettings::default(),
        &bundle,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("at least 5"));
    assert_eq!(mock.calls(), 0);
}

// ========== Reference, Currency, Prompts, Config ==========

#[test]
fn test_cmd_reference() {
    assert!(commands::cmd_reference(None, false).is_ok());
    assert!(commands::cmd_reference(None, true).is_ok());
}

#[tokio::test]
async fn test_cmd_convert() {
    assert!(commands::cmd_convert(100.0, "inr", "usd").await.is_ok());
    assert!(commands::cmd_convert(100.0, "INR", "XYZ").await.is_err());
    assert!(commands::cmd_currencies().await.is_ok());
}

#[test]
fn test_cmd_prompts() {
    assert!(commands::cmd_prompts_list().is_ok());
    assert!(commands::cmd_prompts_show("scan_receipt").is_ok());
    assert!(commands::cmd_prompts_show("analyze_finances").is_ok());

    let err = commands::cmd_prompts_show("does_not_exist").unwrap_err();
    assert!(err.to_string().contains("scan_receipt"));
}

#[test]
fn test_cmd_config_with_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "model.toml", b"[generation]\ntemperature = 0.0\n");
    assert!(commands::cmd_config(Some(&path)).is_ok());
}

// ========== Theme ==========

#[tokio::test]
async fn test_cmd_theme_set_and_get() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("theme.json");

    assert!(commands::cmd_theme_get(&cache).await.is_ok());
    assert!(commands::cmd_theme_set(&cache, "dark").await.is_ok());

    let content = std::fs::read_to_string(&cache).unwrap();
    assert!(content.contains("dark"));
}

#[tokio::test]
async fn test_cmd_theme_set_invalid() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("theme.json");

    assert!(commands::cmd_theme_set(&cache, "sepia").await.is_err());
    assert!(!cache.exists());
}

#[test]
fn test_theme_cache_flag_wins() {
    let path = PathBuf::from("/tmp/custom-theme.json");
    assert_eq!(commands::theme_cache(Some(path.clone())).unwrap(), path);
}
