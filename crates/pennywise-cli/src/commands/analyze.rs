//! Financial analysis command

use std::path::Path;

use anyhow::{Context, Result};
use pennywise_core::pipeline::{FinancialAnalyzer, RetryPolicy};
use pennywise_core::{
    AIBackend, AIClient, AnalysisReport, Error, FinancialProfileBundle, HealthBand, ModelSettings,
    Pipeline, Priority,
};

/// Load a profile bundle from a JSON file
pub fn load_bundle(path: &Path) -> Result<FinancialProfileBundle> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid profile bundle in {}", path.display()))
}

/// Analyze a bundle with an already-built client
pub async fn analyze_bundle(
    client: AIClient,
    settings: &ModelSettings,
    bundle: &FinancialProfileBundle,
) -> Result<AnalysisReport> {
    let analyzer = FinancialAnalyzer::new(client).with_retry(RetryPolicy::from_settings(settings));

    analyzer.analyze(bundle).await.map_err(|e| match e {
        Error::InsufficientData { .. } => anyhow::anyhow!(e.user_message_in(Pipeline::Analysis)),
        other => anyhow::anyhow!("{} ({})", other.user_message_in(Pipeline::Analysis), other),
    })
}

/// Analyze a profile bundle and print the report
pub async fn cmd_analyze(settings: ModelSettings, bundle_path: &Path, json: bool) -> Result<()> {
    let bundle = load_bundle(bundle_path)?;
    let client = AIClient::from_env_with(settings.clone())?;

    if !json {
        println!(
            "📊 Analyzing {} expenses with {}...\n",
            bundle.expense_count(),
            client.model()
        );
    }

    let report = analyze_bundle(client, &settings, &bundle).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let badge = match report.band() {
        HealthBand::Favorable => "🟢",
        HealthBand::Neutral => "🟡",
        HealthBand::Caution => "🔴",
    };

    println!("{} Health score: {}/100", badge, report.health_score);
    println!("   {}", report.score_justification);

    if !report.observations.is_empty() {
        println!("\nObservations:");
        for observation in &report.observations {
            println!("  • {}", observation);
        }
    }

    if !report.action_items.is_empty() {
        println!("\nAction items:");
        for item in &report.action_items {
            let marker = match item.priority {
                Priority::High => "❗",
                Priority::Medium => "➖",
                Priority::Low => "·",
            };
            println!("  {} [{}] {}", marker, item.priority.as_str(), item.title);
            println!("      {}", item.description);
        }
    }

    println!("\n👍 {}", report.positive_reinforcement);
    println!("⚠️  {}", report.risk_assessment);
}
