//! Types for the market-data side of the dashboard

use crate::constants::DEFAULT_PER_PAGE;
use crate::error::PollerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which window of the ranked coin list to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    /// Number of coins per page
    pub per_page: u32,
}

impl PageRequest {
    /// Creates a page request, rejecting zero values
    pub fn new(page: u32, per_page: u32) -> Result<Self, PollerError> {
        if page == 0 {
            return Err(PollerError::InvalidPage("page must be at least 1".to_string()));
        }
        if per_page == 0 {
            return Err(PollerError::InvalidPage(
                "per_page must be at least 1".to_string(),
            ));
        }
        Ok(Self { page, per_page })
    }

    /// Absolute market-cap rank of the coin at `index` within this page
    pub fn rank_of(&self, index: usize) -> u64 {
        index as u64 + 1 + (self.page as u64 - 1) * self.per_page as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One coin of the ranked market list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    /// Stable identifier (e.g. "bitcoin")
    pub id: String,

    /// Display name (e.g. "Bitcoin")
    pub name: String,

    /// Ticker symbol as reported upstream (e.g. "btc")
    pub symbol: String,

    /// Price in USD, absent when the upstream reports none
    pub current_price: Option<f64>,

    /// 24h price change percentage
    pub price_change_percentage_24h: Option<f64>,

    /// Market capitalization in USD
    pub market_cap: Option<f64>,

    /// Image URL
    pub image: String,

    /// 7-day price trail, oldest first
    pub sparkline_7d: Vec<f64>,
}

/// Global market statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    /// Total market capitalization in USD
    pub total_market_cap_usd: f64,

    /// Total 24h volume in USD
    pub total_volume_usd: f64,

    /// Market-cap share per coin symbol, in percent
    pub market_cap_percentage: HashMap<String, f64>,

    /// Number of active coins
    pub active_cryptocurrencies: u64,
}

impl GlobalSnapshot {
    /// Market-cap share of a coin symbol (lowercase, e.g. "btc")
    pub fn dominance(&self, symbol: &str) -> Option<f64> {
        self.market_cap_percentage.get(symbol).copied()
    }
}

/// Coin page and global statistics fetched in one poll tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Ranked coins of the requested page
    pub coins: Vec<CoinSnapshot>,

    /// Global statistics
    pub global: GlobalSnapshot,

    /// Page that produced this snapshot
    pub page: PageRequest,

    /// When the snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Creates a snapshot stamped with the current time
    pub fn new(coins: Vec<CoinSnapshot>, global: GlobalSnapshot, page: PageRequest) -> Self {
        Self {
            coins,
            global,
            page,
            fetched_at: Utc::now(),
        }
    }

    /// Looks up a coin by identifier
    pub fn coin(&self, id: &str) -> Option<&CoinSnapshot> {
        self.coins.iter().find(|c| c.id == id)
    }

    /// Check if the snapshot is older than `threshold_seconds`
    pub fn is_stale(&self, threshold_seconds: u64) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age.num_seconds() > threshold_seconds as i64
    }
}

/// Events published by the market-data poller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketEvent {
    /// A fresh snapshot replaced the previous one
    SnapshotApplied {
        generation: u64,
        page: PageRequest,
        coin_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A response arrived after its parameters were superseded
    SnapshotDiscarded {
        generation: u64,
        page: PageRequest,
        timestamp: DateTime<Utc>,
    },

    /// A poll tick failed; the previous snapshot is kept
    FetchFailed {
        generation: u64,
        page: PageRequest,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl MarketEvent {
    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::SnapshotApplied { .. } => "SNAPSHOT_APPLIED",
            MarketEvent::SnapshotDiscarded { .. } => "SNAPSHOT_DISCARDED",
            MarketEvent::FetchFailed { .. } => "FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketEvent::SnapshotApplied {
                page, coin_count, ..
            } => write!(
                f,
                "Snapshot applied: page {} ({} per page), {} coins",
                page.page, page.per_page, coin_count
            ),
            MarketEvent::SnapshotDiscarded {
                generation, page, ..
            } => write!(
                f,
                "Snapshot #{} for page {} discarded (superseded)",
                generation, page.page
            ),
            MarketEvent::FetchFailed { error_message, .. } => {
                write!(f, "Market fetch failed: {}", error_message)
            }
        }
    }
}

/// Overall health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Fresh data available
    Healthy,
    /// Data available but stale
    Degraded,
    /// No data available
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_of_accounts_for_page_offset() {
        let first = PageRequest::new(1, 10).unwrap();
        assert_eq!(first.rank_of(0), 1);
        assert_eq!(first.rank_of(9), 10);

        let third = PageRequest::new(3, 50).unwrap();
        assert_eq!(third.rank_of(0), 101);
    }

    #[test]
    fn test_page_request_rejects_zero() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
    }
}
