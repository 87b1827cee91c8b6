//! exchangerate.host exchange-rate provider implementation

use crate::{
    constants::{EXCHANGE_RATE_API_URL, REQUEST_TIMEOUT_SECS, USER_AGENT},
    currency::Currency,
    error::ProviderError,
    provider::ExchangeRateProvider,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Response of `/latest?base=...&symbols=...`
#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// exchangerate.host provider
pub struct ExchangeRateHostProvider {
    client: Client,
    base_url: String,
}

impl ExchangeRateHostProvider {
    /// Creates a provider against the public API
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(EXCHANGE_RATE_API_URL)
    }

    /// Creates a provider against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self, base: Currency, target: Currency) -> String {
        format!(
            "{}/latest?base={}&symbols={}",
            self.base_url,
            base.code(),
            target.code()
        )
    }
}

/// Extracts the rate for `target` from a decoded response
fn parse_rate(response: &LatestResponse, target: Currency) -> Result<f64, ProviderError> {
    response
        .rates
        .get(target.code())
        .copied()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("No {} rate in response", target)))
}

#[async_trait]
impl ExchangeRateProvider for ExchangeRateHostProvider {
    async fn fetch_rate(&self, base: Currency, target: Currency) -> Result<f64, ProviderError> {
        let url = self.build_url(base, target);
        tracing::debug!(url = %url, "Fetching exchange rate");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::NetworkError)?;

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!("HTTP {}", response.status())));
        }

        let body = response.text().await.map_err(ProviderError::NetworkError)?;
        let latest: LatestResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse exchange-rate response: {}", e))
        })?;

        parse_rate(&latest, target)
    }

    fn provider_name(&self) -> &'static str {
        "exchangerate.host"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let provider = ExchangeRateHostProvider::with_base_url("https://rates.example/").unwrap();
        assert_eq!(
            provider.build_url(Currency::USD, Currency::INR),
            "https://rates.example/latest?base=USD&symbols=INR"
        );
    }

    #[test]
    fn test_parse_rate() {
        let response: LatestResponse =
            serde_json::from_str(r#"{"base":"USD","rates":{"INR":83.12}}"#).unwrap();
        assert_eq!(parse_rate(&response, Currency::INR).unwrap(), 83.12);
    }

    #[test]
    fn test_missing_rate_is_invalid() {
        // error payloads from the API carry no rates at all
        let response: LatestResponse =
            serde_json::from_str(r#"{"success":false,"error":{"code":101}}"#).unwrap();
        assert!(matches!(
            parse_rate(&response, Currency::INR),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
