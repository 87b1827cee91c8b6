//! CoinGecko market-data provider implementation

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_GLOBAL_ENDPOINT, COINGECKO_MARKETS_ENDPOINT,
        REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::ProviderError,
    provider::MarketDataProvider,
    types::{CoinSnapshot, GlobalSnapshot, PageRequest},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// One entry of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct MarketsCoin {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    sparkline_in_7d: Option<Sparkline7d>,
}

#[derive(Debug, Deserialize)]
struct Sparkline7d {
    #[serde(default)]
    price: Vec<f64>,
}

impl From<MarketsCoin> for CoinSnapshot {
    fn from(coin: MarketsCoin) -> Self {
        Self {
            id: coin.id,
            name: coin.name,
            symbol: coin.symbol,
            current_price: coin.current_price,
            price_change_percentage_24h: coin.price_change_percentage_24h,
            market_cap: coin.market_cap,
            image: coin.image.unwrap_or_default(),
            sparkline_7d: coin.sparkline_in_7d.map(|s| s.price).unwrap_or_default(),
        }
    }
}

/// The `/global` response wraps everything in `data`
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    active_cryptocurrencies: u64,
    total_market_cap: HashMap<String, f64>,
    total_volume: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
}

impl TryFrom<GlobalData> for GlobalSnapshot {
    type Error = ProviderError;

    fn try_from(data: GlobalData) -> Result<Self, Self::Error> {
        let total_market_cap_usd = data.total_market_cap.get("usd").copied().ok_or_else(|| {
            ProviderError::InvalidResponse("global data has no usd market cap".to_string())
        })?;
        let total_volume_usd = data.total_volume.get("usd").copied().ok_or_else(|| {
            ProviderError::InvalidResponse("global data has no usd volume".to_string())
        })?;

        Ok(Self {
            total_market_cap_usd,
            total_volume_usd,
            market_cap_percentage: data.market_cap_percentage,
            active_cryptocurrencies: data.active_cryptocurrencies,
        })
    }
}

/// CoinGecko market-data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider against the public API
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(COINGECKO_API_URL)
    }

    /// Creates a CoinGecko provider against a custom base URL
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

    /// Builds the `/coins/markets` URL for a page
    fn markets_url(&self, page: PageRequest) -> String {
        format!(
            "{}{}?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=true&price_change_percentage=24h",
            self.base_url, COINGECKO_MARKETS_ENDPOINT, page.per_page, page.page
        )
    }

    /// Builds the `/global` URL
    fn global_url(&self) -> String {
        format!("{}{}", self.base_url, COINGECKO_GLOBAL_ENDPOINT)
    }

    /// Issues a GET and decodes a JSON body, mapping HTTP failures
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        tracing::debug!(url, "Fetching from CoinGecko");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProviderError::NetworkError)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let response_text = response.text().await.map_err(ProviderError::NetworkError)?;

        serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse CoinGecko response: {}. Response: {}",
                e, response_text
            ))
        })
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_markets(&self, page: PageRequest) -> Result<Vec<CoinSnapshot>, ProviderError> {
        let coins: Vec<MarketsCoin> = self.get_json(&self.markets_url(page)).await?;

        tracing::debug!(
            count = coins.len(),
            page = page.page,
            per_page = page.per_page,
            "Fetched coin markets from CoinGecko"
        );

        Ok(coins.into_iter().map(CoinSnapshot::from).collect())
    }

    async fn fetch_global(&self) -> Result<GlobalSnapshot, ProviderError> {
        let response: GlobalResponse = self.get_json(&self.global_url()).await?;
        GlobalSnapshot::try_from(response.data)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markets_url_carries_fixed_fields() {
        let provider = CoinGeckoProvider::with_base_url("https://api.example/v3/").unwrap();
        let url = provider.markets_url(PageRequest::new(2, 50).unwrap());
        assert_eq!(
            url,
            "https://api.example/v3/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=50&page=2&sparkline=true&price_change_percentage=24h"
        );
        assert_eq!(provider.global_url(), "https://api.example/v3/global");
    }

    #[test]
    fn test_parse_markets_entry() {
        let body = r#"[{
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "image": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
            "current_price": 50000.0,
            "market_cap": 980000000000,
            "market_cap_rank": 1,
            "price_change_percentage_24h": -1.25,
            "sparkline_in_7d": { "price": [49000.0, 49500.5, 50000.0] }
        }, {
            "id": "obscure",
            "symbol": "obs",
            "name": "Obscure",
            "image": null,
            "current_price": null,
            "market_cap": null,
            "price_change_percentage_24h": null
        }]"#;

        let coins: Vec<MarketsCoin> = serde_json::from_str(body).unwrap();
        let coins: Vec<CoinSnapshot> = coins.into_iter().map(CoinSnapshot::from).collect();

        assert_eq!(coins[0].id, "bitcoin");
        assert_eq!(coins[0].current_price, Some(50000.0));
        assert_eq!(coins[0].price_change_percentage_24h, Some(-1.25));
        assert_eq!(coins[0].sparkline_7d.len(), 3);

        assert_eq!(coins[1].current_price, None);
        assert!(coins[1].image.is_empty());
        assert!(coins[1].sparkline_7d.is_empty());
    }

    #[test]
    fn test_parse_global() {
        let body = r#"{"data": {
            "active_cryptocurrencies": 14012,
            "markets": 1100,
            "total_market_cap": {"usd": 2.4e12, "inr": 2.0e14},
            "total_volume": {"usd": 8.1e10},
            "market_cap_percentage": {"btc": 51.3, "eth": 17.2}
        }}"#;

        let response: GlobalResponse = serde_json::from_str(body).unwrap();
        let global = GlobalSnapshot::try_from(response.data).unwrap();
        assert_eq!(global.total_market_cap_usd, 2.4e12);
        assert_eq!(global.total_volume_usd, 8.1e10);
        assert_eq!(global.dominance("btc"), Some(51.3));
        assert_eq!(global.active_cryptocurrencies, 14012);
    }

    #[test]
    fn test_global_without_usd_is_invalid() {
        let body = r#"{"data": {
            "active_cryptocurrencies": 1,
            "total_market_cap": {"eur": 1.0},
            "total_volume": {"usd": 1.0},
            "market_cap_percentage": {}
        }}"#;

        let response: GlobalResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            GlobalSnapshot::try_from(response.data),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
