//! Upstream API provider implementations

pub mod coingecko;
pub mod exchange_rate;

pub use coingecko::CoinGeckoProvider;
pub use exchange_rate::ExchangeRateHostProvider;
