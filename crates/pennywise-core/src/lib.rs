//! Pennywise Core Library
//!
//! Shared functionality for the Pennywise personal finance app:
//! - Receipt extraction pipeline (image to expense candidate)
//! - Financial analysis pipeline (profile bundle to health report)
//! - Pluggable model backends (Gemini, mock)
//! - Prompt library with embedded defaults and user overrides
//! - Reference data for categories, payment apps and banks
//! - Currency conversion with cacheable rate providers
//! - Theme preference reconciliation

pub mod ai;
pub mod config;
pub mod currency;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod preferences;
pub mod prompts;
pub mod reference;

/// Test utilities including mock Gemini server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, ActionItem, AnalysisReport, ExtractionResult, GeminiBackend, HealthBand,
    ImagePayload, MockBackend, ModelRequest, Priority,
};
pub use config::ModelSettings;
pub use currency::{
    CachedRateProvider, Conversion, CurrencyConverter, RateProvider, RateTable,
    StalenessPolicy, StaticRateProvider,
};
pub use error::{Error, ErrorKind, Pipeline, Result};
pub use models::{ExpenseRecord, FinancialProfileBundle, GoalRecord, RecurringExpense};
pub use pipeline::{
    FinancialAnalyzer, ReceiptScanner, RetryPolicy, MANUAL_ENTRY_FALLBACK, MIN_EXPENSE_RECORDS,
};
pub use preferences::{
    InMemoryProfileStore, LocalCache, PreferenceStore, ProfileStore, ResolvedTheme, Theme,
    ThemeSource, ThemeUpdate,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use reference::{ReferenceData, ReferenceKind};
