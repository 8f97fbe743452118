//! Currency conversion with pluggable rate providers
//!
//! # Architecture
//!
//! - `RateProvider` trait: pull-based source of a [`RateTable`]
//! - `StaticRateProvider`: built-in offline table
//! - `CachedRateProvider`: wraps any provider with a [`StalenessPolicy`]
//! - `CurrencyConverter`: validates codes and converts through the base currency
//!
//! Rates are stored as the value of one unit of a currency in the base
//! currency (INR), so `amount * rate(from) / rate(to)` converts between any
//! two supported codes.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Currency every rate is expressed in
pub const BASE_CURRENCY: &str = "INR";

/// INR per one unit of each currency
const BUILTIN_RATES: &[(&str, f64)] = &[
    ("INR", 1.0),
    ("USD", 83.2),
    ("EUR", 90.4),
    ("GBP", 105.6),
    ("JPY", 0.56),
    ("AUD", 55.1),
    ("CAD", 61.3),
    ("SGD", 62.0),
    ("AED", 22.65),
    ("CNY", 11.5),
];

/// A snapshot of exchange rates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub base: String,
    /// Value of one unit of each code in `base`
    pub rates: BTreeMap<String, f64>,
    pub fetched_at: DateTime<Utc>,
}

impl RateTable {
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    /// Supported codes, sorted
    pub fn codes(&self) -> Vec<&str> {
        self.rates.keys().map(String::as_str).collect()
    }

    fn is_fresh(&self, policy: &StalenessPolicy, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(policy.max_age) {
            Ok(max_age) => now.signed_duration_since(self.fetched_at) < max_age,
            Err(_) => true,
        }
    }
}

/// Source of exchange rates
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the current rate table
    async fn fetch_rates(&self) -> Result<RateTable>;

    /// Provider name (for logging)
    fn name(&self) -> &str;
}

/// Fixed rates compiled into the binary
#[derive(Debug, Clone)]
pub struct StaticRateProvider {
    rates: BTreeMap<String, f64>,
}

impl StaticRateProvider {
    pub fn builtin() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }

    /// Custom table; the base currency is added at 1.0 if missing
    pub fn with_rates<I: IntoIterator<Item = (String, f64)>>(rates: I) -> Self {
        let mut rates: BTreeMap<String, f64> = rates
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        rates.entry(BASE_CURRENCY.to_string()).or_insert(1.0);
        Self { rates }
    }
}

impl Default for StaticRateProvider {
    fn default() -> Self {
        Self::builtin()
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn fetch_rates(&self) -> Result<RateTable> {
        Ok(RateTable {
            base: BASE_CURRENCY.to_string(),
            rates: self.rates.clone(),
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// How old a cached table may get before it is refetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub max_age: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// Caches another provider's table.
///
/// Stale tables are refetched. If that fails the stale table is served;
/// with nothing cached the error is returned.
pub struct CachedRateProvider<P> {
    inner: P,
    policy: StalenessPolicy,
    cache: RwLock<Option<RateTable>>,
}

impl<P: RateProvider> CachedRateProvider<P> {
    pub fn new(inner: P, policy: StalenessPolicy) -> Self {
        Self {
            inner,
            policy,
            cache: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// The cached table, if any, without refreshing
    pub async fn cached(&self) -> Option<RateTable> {
        self.cache.read().await.clone()
    }

    async fn current(&self) -> Result<RateTable> {
        if let Some(table) = self.cache.read().await.as_ref() {
            if table.is_fresh(&self.policy, Utc::now()) {
                return Ok(table.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(table) = cache.as_ref() {
            if table.is_fresh(&self.policy, Utc::now()) {
                return Ok(table.clone());
            }
        }

        match self.inner.fetch_rates().await {
            Ok(table) => {
                debug!(provider = self.inner.name(), codes = table.rates.len(), "Refreshed rates");
                *cache = Some(table.clone());
                Ok(table)
            }
            Err(e) => match cache.as_ref() {
                Some(stale) => {
                    warn!(
                        provider = self.inner.name(),
                        error = %e,
                        fetched_at = %stale.fetched_at,
                        "Rate refresh failed, serving stale table"
                    );
                    Ok(stale.clone())
                }
                None => Err(e),
            },
        }
    }
}

#[async_trait]
impl<P: RateProvider> RateProvider for CachedRateProvider<P> {
    async fn fetch_rates(&self) -> Result<RateTable> {
        self.current().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Result of one conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
    /// Units of `to` per unit of `from`
    pub rate: f64,
    pub converted: f64,
    pub as_of: DateTime<Utc>,
}

/// Converts amounts between supported currencies
pub struct CurrencyConverter<P> {
    provider: P,
}

impl<P: RateProvider> CurrencyConverter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Supported currency codes
    pub async fn supported(&self) -> Result<Vec<String>> {
        let table = self.provider.fetch_rates().await?;
        Ok(table.codes().into_iter().map(str::to_string).collect())
    }

    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion> {
        if !amount.is_finite() {
            return Err(Error::validation("amount", "must be a finite number"));
        }
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();

        let table = self.provider.fetch_rates().await?;
        let from_rate = lookup(&table, "from", &from)?;
        let to_rate = lookup(&table, "to", &to)?;

        let rate = if from == to { 1.0 } else { from_rate / to_rate };

        Ok(Conversion {
            amount,
            converted: amount * rate,
            rate,
            from,
            to,
            as_of: table.fetched_at,
        })
    }
}

fn lookup(table: &RateTable, field: &str, code: &str) -> Result<f64> {
    match table.rate(code) {
        Some(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        Some(rate) => Err(Error::validation(
            field,
            format!("invalid rate {} for '{}'", rate, code),
        )),
        None => Err(Error::validation(
            field,
            format!("unsupported currency '{}'", code),
        )),
    }
}
