//! Financial analysis pipeline

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::ai::parsing::parse_analysis;
use crate::ai::{AIBackend, AIClient, AnalysisReport};
use crate::error::{Error, Result};
use crate::models::FinancialProfileBundle;
use crate::prompts::{build_analysis_request, PromptId, PromptLibrary};

use super::{invoke, load_prompt, RetryPolicy, SharedPrompts};

/// Fewer expenses than this and there is nothing meaningful to assess
pub const MIN_EXPENSE_RECORDS: usize = 5;

/// Produces a financial health report from a profile bundle
#[derive(Clone)]
pub struct FinancialAnalyzer {
    client: AIClient,
    prompts: SharedPrompts,
    retry: RetryPolicy,
}

impl FinancialAnalyzer {
    pub fn new(client: AIClient) -> Self {
        Self {
            client,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_prompts(mut self, prompts: SharedPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Analyze a bundle.
    ///
    /// Bundles with fewer than [`MIN_EXPENSE_RECORDS`] expenses fail with
    /// [`Error::InsufficientData`] and never reach the model.
    pub async fn analyze(&self, bundle: &FinancialProfileBundle) -> Result<AnalysisReport> {
        let found = bundle.expense_count();
        if found < MIN_EXPENSE_RECORDS {
            info!(found, required = MIN_EXPENSE_RECORDS, "Not enough expenses to analyze");
            return Err(Error::InsufficientData {
                found,
                required: MIN_EXPENSE_RECORDS,
            });
        }

        info!(
            expenses = found,
            goals = bundle.goals.len(),
            recurring = bundle.recurring.len(),
            model = %self.client.model(),
            "Analyzing finances"
        );

        let prompt = load_prompt(&self.prompts, PromptId::AnalyzeFinances)?;
        let request = build_analysis_request(&prompt, bundle).map_err(Error::into_pipeline)?;

        let report = invoke(&self.client, &request, self.retry, "analysis", parse_analysis).await?;

        info!(
            health_score = report.health_score,
            action_items = report.action_items.len(),
            "Analysis complete"
        );
        Ok(report)
    }
}
