//! Currency command implementations

use anyhow::Result;
use pennywise_core::currency::{CurrencyConverter, StaticRateProvider, BASE_CURRENCY};

/// Convert an amount and print the result
pub async fn cmd_convert(amount: f64, from: &str, to: &str) -> Result<()> {
    let converter = CurrencyConverter::new(StaticRateProvider::builtin());
    let conversion = converter.convert(amount, from, to).await?;

    println!(
        "💱 {:.2} {} = {:.2} {}",
        conversion.amount, conversion.from, conversion.converted, conversion.to
    );
    println!(
        "   Rate: 1 {} = {:.6} {} (as of {})",
        conversion.from,
        conversion.rate,
        conversion.to,
        conversion.as_of.format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}

/// List supported currency codes
pub async fn cmd_currencies() -> Result<()> {
    let converter = CurrencyConverter::new(StaticRateProvider::builtin());
    let codes = converter.supported().await?;

    println!("Supported currencies (base {}):", BASE_CURRENCY);
    println!("  {}", codes.join(", "));

    Ok(())
}
