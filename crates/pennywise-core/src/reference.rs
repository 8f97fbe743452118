//! Reference data: the closed lists the model must choose from
//!
//! Categories, payment apps and banks are supplied to the extraction prompt
//! verbatim and used afterwards to validate what the model returned.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_CATEGORIES: &[&str] = &[
    "Food & Dining",
    "Groceries",
    "Shopping",
    "Transportation",
    "Bills & Utilities",
    "Rent",
    "Entertainment",
    "Healthcare",
    "Education",
    "Travel",
    "Personal Care",
    "Investments",
    "Gifts & Donations",
    "Other",
];

const DEFAULT_PAYMENT_APPS: &[&str] = &[
    "Paytm",
    "Google Pay",
    "PhonePe",
    "Amazon Pay",
    "BHIM UPI",
    "Cash",
    "Credit Card",
    "Debit Card",
    "Net Banking",
];

const DEFAULT_BANKS: &[&str] = &[
    "HDFC Bank",
    "State Bank of India",
    "ICICI Bank",
    "Axis Bank",
    "Kotak Mahindra Bank",
    "Punjab National Bank",
    "Bank of Baroda",
    "Yes Bank",
    "IndusInd Bank",
    "Canara Bank",
];

/// A single reference entry. Only the display name is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEntry")]
pub struct ReferenceEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ReferenceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
        }
    }
}

/// Entries may be written as bare strings or as objects
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        icon: Option<String>,
    },
}

impl From<RawEntry> for ReferenceEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Name(name) => ReferenceEntry { name, icon: None },
            RawEntry::Full { name, icon } => ReferenceEntry { name, icon },
        }
    }
}

/// Which list a constrained field is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Category,
    PaymentApp,
    Bank,
}

impl ReferenceKind {
    /// Field name in the model's JSON output
    pub fn field(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::PaymentApp => "paymentApp",
            Self::Bank => "bankName",
        }
    }
}

/// The three enumerations used to constrain extraction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    #[serde(default)]
    pub categories: Vec<ReferenceEntry>,
    #[serde(default)]
    pub payment_apps: Vec<ReferenceEntry>,
    #[serde(default)]
    pub banks: Vec<ReferenceEntry>,
}

impl ReferenceData {
    /// Build from plain name lists
    pub fn from_names<S: AsRef<str>>(categories: &[S], payment_apps: &[S], banks: &[S]) -> Self {
        let to_entries = |names: &[S]| -> Vec<ReferenceEntry> {
            names.iter().map(|n| ReferenceEntry::new(n.as_ref())).collect()
        };
        Self {
            categories: to_entries(categories),
            payment_apps: to_entries(payment_apps),
            banks: to_entries(banks),
        }
    }

    /// Built-in lists shipped with the app
    pub fn builtin() -> Self {
        Self::from_names(DEFAULT_CATEGORIES, DEFAULT_PAYMENT_APPS, DEFAULT_BANKS)
    }

    /// Load reference data from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let data: ReferenceData = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidData(format!(
                "Invalid reference data in {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(data)
    }

    pub fn entries(&self, kind: ReferenceKind) -> &[ReferenceEntry] {
        match kind {
            ReferenceKind::Category => &self.categories,
            ReferenceKind::PaymentApp => &self.payment_apps,
            ReferenceKind::Bank => &self.banks,
        }
    }

    /// Display names for one list, in order
    pub fn names(&self, kind: ReferenceKind) -> Vec<&str> {
        self.entries(kind).iter().map(|e| e.name.as_str()).collect()
    }

    /// Exact, case-sensitive membership check
    pub fn contains(&self, kind: ReferenceKind, value: &str) -> bool {
        self.entries(kind).iter().any(|e| e.name == value)
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}
