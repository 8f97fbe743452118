//! Data models for a user's financial history
//!
//! These mirror what the hosted backend hands us. Pennywise never writes
//! them back; the analysis pipeline only reads a [`FinancialProfileBundle`].

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A logged expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub payment_app: String,
    #[serde(default)]
    pub bank_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A savings goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub saved_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

impl GoalRecord {
    /// Progress toward the target as a percentage (0 when the target is not positive)
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount > 0.0 {
            (self.saved_amount / self.target_amount * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

/// Recurring expense frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Approximate monthly cost of one occurrence at this frequency
    pub fn monthly_equivalent(&self, amount: f64) -> f64 {
        match self {
            Self::Daily => amount * 30.0,
            Self::Weekly => amount * 52.0 / 12.0,
            Self::Monthly => amount,
            Self::Quarterly => amount / 3.0,
            Self::Yearly => amount / 12.0,
        }
    }
}

/// A recurring bill or subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub amount: f64,
    pub frequency: Frequency,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due: Option<NaiveDate>,
}

/// Read-only snapshot of one user's history, assembled per analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfileBundle {
    #[serde(default)]
    pub expenses: Vec<ExpenseRecord>,
    #[serde(default)]
    pub goals: Vec<GoalRecord>,
    #[serde(default)]
    pub recurring: Vec<RecurringExpense>,
}

impl FinancialProfileBundle {
    pub fn expense_count(&self) -> usize {
        self.expenses.len()
    }

    /// Aggregate figures that accompany the raw records in the analysis prompt
    pub fn summary(&self) -> ProfileSummary {
        let total_spent: f64 = self.expenses.iter().map(|e| e.amount).sum();
        let first_date = self.expenses.iter().map(|e| e.date).min();
        let last_date = self.expenses.iter().map(|e| e.date).max();

        let mut category_totals: HashMap<&str, f64> = HashMap::new();
        let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
        for expense in &self.expenses {
            let category = if expense.category.is_empty() {
                "Uncategorized"
            } else {
                expense.category.as_str()
            };
            *category_totals.entry(category).or_default() += expense.amount;
            *by_month
                .entry(expense.date.format("%Y-%m").to_string())
                .or_default() += expense.amount;
        }

        let mut by_category: Vec<CategoryTotal> = category_totals
            .into_iter()
            .map(|(category, total)| CategoryTotal {
                category: category.to_string(),
                total,
            })
            .collect();
        by_category.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });

        let monthly_average = if by_month.is_empty() {
            0.0
        } else {
            total_spent / by_month.len() as f64
        };

        let recurring_monthly_total = self
            .recurring
            .iter()
            .map(|r| r.frequency.monthly_equivalent(r.amount))
            .sum();

        let goals = self
            .goals
            .iter()
            .map(|g| GoalProgress {
                name: g.name.clone(),
                target_amount: g.target_amount,
                saved_amount: g.saved_amount,
                percent: g.progress_percent(),
                deadline: g.deadline,
            })
            .collect();

        ProfileSummary {
            expense_count: self.expenses.len(),
            total_spent,
            first_date,
            last_date,
            monthly_average,
            by_category,
            by_month,
            recurring_monthly_total,
            goals,
        }
    }
}

/// Spending total for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// Progress snapshot for one goal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub name: String,
    pub target_amount: f64,
    pub saved_amount: f64,
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

/// Derived statistics over a profile bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub expense_count: usize,
    pub total_spent: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Average over months that have at least one expense
    pub monthly_average: f64,
    /// Sorted by total, largest first
    pub by_category: Vec<CategoryTotal>,
    /// Keyed by "YYYY-MM"
    pub by_month: BTreeMap<String, f64>,
    pub recurring_monthly_total: f64,
    pub goals: Vec<GoalProgress>,
}
