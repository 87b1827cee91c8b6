//! Provider abstractions for the upstream market-data and exchange-rate APIs

use crate::{
    currency::Currency,
    error::ProviderError,
    types::{CoinSnapshot, GlobalSnapshot, MarketSnapshot, PageRequest},
};
use async_trait::async_trait;

/// Trait for market-data providers
///
/// Implementations fetch a ranked page of coins and the global market
/// statistics from some upstream (CoinGecko in production).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches one page of coins ranked by market cap, priced in USD
    ///
    /// # Arguments
    /// * `page` - Page number and page size to fetch
    async fn fetch_markets(&self, page: PageRequest) -> Result<Vec<CoinSnapshot>, ProviderError>;

    /// Fetches the global market statistics
    async fn fetch_global(&self) -> Result<GlobalSnapshot, ProviderError>;

    /// Fetches both halves of a poll tick
    ///
    /// Both requests are issued concurrently; the snapshot is only produced
    /// when both succeed.
    async fn fetch_snapshot(&self, page: PageRequest) -> Result<MarketSnapshot, ProviderError> {
        let (coins, global) = tokio::try_join!(self.fetch_markets(page), self.fetch_global())?;
        Ok(MarketSnapshot::new(coins, global, page))
    }

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Trait for exchange-rate providers
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Fetches how many units of `target` one unit of `base` buys
    async fn fetch_rate(&self, base: Currency, target: Currency) -> Result<f64, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
