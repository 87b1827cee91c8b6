//! Display currencies, the session exchange rate and amount formatting

use crate::{constants::FALLBACK_INR_RATE, provider::ExchangeRateProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rendered in place of amounts that are absent or not finite
pub const PLACEHOLDER: &str = "-";

/// Currencies the dashboard can display amounts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar, the unit of all upstream prices
    #[default]
    USD,
    /// Indian rupee
    INR,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::INR => "INR",
        }
    }

    /// Locale whose grouping conventions are used for this currency
    pub fn locale(&self) -> &'static str {
        match self {
            Currency::USD => "en-US",
            Currency::INR => "en-IN",
        }
    }

    /// Currency symbol placed before the amount
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::INR => "₹",
        }
    }

    /// Get all supported currencies
    pub fn all() -> &'static [Currency] {
        &[Currency::USD, Currency::INR]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "INR" => Ok(Currency::INR),
            other => Err(format!("unsupported currency: {}", other)),
        }
    }
}

/// Where the session exchange rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Live,
    Fallback,
}

/// USD→INR rate cached for the whole session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    inr_per_usd: f64,
    source: RateSource,
}

impl ExchangeRate {
    /// A rate obtained from the exchange-rate API
    pub fn live(inr_per_usd: f64) -> Self {
        Self {
            inr_per_usd,
            source: RateSource::Live,
        }
    }

    /// The hardcoded rate used when the fetch fails
    pub fn fallback() -> Self {
        Self {
            inr_per_usd: FALLBACK_INR_RATE,
            source: RateSource::Fallback,
        }
    }

    /// Fetches the rate once, falling back to the constant on any failure
    ///
    /// Never retried; the result is meant to be held for the session.
    pub async fn fetch_or_fallback(provider: &dyn ExchangeRateProvider) -> Self {
        match provider.fetch_rate(Currency::USD, Currency::INR).await {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                tracing::info!(rate, provider = provider.provider_name(), "Fetched USD/INR rate");
                Self::live(rate)
            }
            Ok(rate) => {
                tracing::warn!(rate, "Exchange-rate API returned an unusable rate, using fallback");
                Self::fallback()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = FALLBACK_INR_RATE,
                    "Failed to fetch exchange rate, using fallback"
                );
                Self::fallback()
            }
        }
    }

    /// Multiplier from USD into `currency`
    pub fn rate_for(&self, currency: Currency) -> f64 {
        match currency {
            Currency::USD => 1.0,
            Currency::INR => self.inr_per_usd,
        }
    }

    /// Where this rate came from
    pub fn source(&self) -> RateSource {
        self.source
    }

    /// Converts a USD amount into `currency`
    pub fn convert(&self, amount_usd: f64, currency: Currency) -> f64 {
        amount_usd * self.rate_for(currency)
    }

    /// Converts a USD amount into `currency` and formats it for display
    pub fn display(&self, amount_usd: Option<f64>, currency: Currency) -> String {
        format_currency(amount_usd.map(|a| self.convert(a, currency)), currency)
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Formats an amount already expressed in `currency`
///
/// Two fraction digits, `en-US` thousands grouping for USD and `en-IN`
/// lakh/crore grouping for INR. Absent or non-finite input yields
/// [`PLACEHOLDER`].
pub fn format_currency(value: Option<f64>, currency: Currency) -> String {
    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => return PLACEHOLDER.to_string(),
    };

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let grouped = match currency {
        Currency::USD => group_thousands(int_part),
        Currency::INR => group_indian(int_part),
    };

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}{}.{}", sign, currency.symbol(), grouped, frac_part)
}

/// 1234567 -> 1,234,567
fn group_thousands(digits: &str) -> String {
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*b as char);
    }
    out
}

/// 1234567 -> 12,34,567
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let head_bytes = head.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    for (i, b) in head_bytes.iter().enumerate() {
        if i > 0 && (head_bytes.len() - i) % 2 == 0 {
            out.push(',');
        }
        out.push(*b as char);
    }
    out.push(',');
    out.push_str(tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::mock::MockRateProvider;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_currency(Some(0.0), Currency::USD), "$0.00");
        assert_eq!(format_currency(Some(999.5), Currency::USD), "$999.50");
        assert_eq!(format_currency(Some(1234.567), Currency::USD), "$1,234.57");
        assert_eq!(
            format_currency(Some(1_234_567_890.0), Currency::USD),
            "$1,234,567,890.00"
        );
        assert_eq!(format_currency(Some(-42.1), Currency::USD), "-$42.10");
    }

    #[test]
    fn test_format_inr_uses_indian_grouping() {
        assert_eq!(format_currency(Some(123.0), Currency::INR), "₹123.00");
        assert_eq!(format_currency(Some(1234.0), Currency::INR), "₹1,234.00");
        assert_eq!(format_currency(Some(123456.78), Currency::INR), "₹1,23,456.78");
        assert_eq!(
            format_currency(Some(12_345_678.0), Currency::INR),
            "₹1,23,45,678.00"
        );
    }

    #[test]
    fn test_placeholder_for_missing_or_non_finite() {
        let rate = ExchangeRate::live(83.0);
        for currency in Currency::all() {
            assert_eq!(rate.display(None, *currency), PLACEHOLDER);
            assert_eq!(rate.display(Some(f64::NAN), *currency), PLACEHOLDER);
            assert_eq!(rate.display(Some(f64::INFINITY), *currency), PLACEHOLDER);
            assert_eq!(rate.display(Some(f64::NEG_INFINITY), *currency), PLACEHOLDER);
        }
    }

    #[test]
    fn test_conversion_is_monotonic() {
        let rate = ExchangeRate::live(83.25);
        let amounts = [-100.0, -0.5, 0.0, 0.01, 1.0, 99.99, 100.0, 50_000.0, 1e12];
        for currency in Currency::all() {
            let converted: Vec<f64> = amounts.iter().map(|a| rate.convert(*a, *currency)).collect();
            assert!(converted.windows(2).all(|w| w[0] <= w[1]), "{:?}", converted);
        }
    }

    #[test]
    fn test_usd_is_identity() {
        let rate = ExchangeRate::live(83.0);
        assert_eq!(rate.convert(50_000.0, Currency::USD), 50_000.0);
        assert_eq!(rate.display(Some(2.0), Currency::INR), "₹166.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<Currency>().unwrap(), Currency::INR);
        assert_eq!(" USD ".parse::<Currency>().unwrap(), Currency::USD);
        assert!("EUR".parse::<Currency>().is_err());
    }

    #[tokio::test]
    async fn test_fetch_uses_live_rate() {
        let provider = MockRateProvider::with_rate(83.5);
        let rate = ExchangeRate::fetch_or_fallback(&provider).await;
        assert_eq!(rate.source(), RateSource::Live);
        assert_eq!(rate.rate_for(Currency::INR), 83.5);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_on_error() {
        let provider = MockRateProvider::with_error(ProviderError::RateLimitExceeded);
        let rate = ExchangeRate::fetch_or_fallback(&provider).await;
        assert_eq!(rate.source(), RateSource::Fallback);
        assert_eq!(rate.rate_for(Currency::INR), FALLBACK_INR_RATE);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_on_nonsense_rate() {
        let provider = MockRateProvider::with_rate(0.0);
        let rate = ExchangeRate::fetch_or_fallback(&provider).await;
        assert_eq!(rate.source(), RateSource::Fallback);
    }
}
