//! Derived dashboard view
//!
//! Everything the dashboard shows is recomputed from three immutable inputs:
//! the latest market snapshot, the portfolio entries and the alert list.
//! Nothing here mutates state or performs I/O.

use crate::{
    alerts::{evaluate, Alert, TriggeredAlert},
    constants::SPARKLINE_POINTS,
    portfolio::PortfolioEntry,
    types::{CoinSnapshot, GlobalSnapshot, MarketSnapshot},
};

/// Row styling by 24h change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// `Up` only for a strictly positive change; zero and unknown are `Down`
    pub fn classify(change_24h: Option<f64>) -> Self {
        match change_24h {
            Some(change) if change > 0.0 => Trend::Up,
            _ => Trend::Down,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
        }
    }
}

/// Trailing window of a 7-day price trail
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sparkline {
    points: Vec<f64>,
}

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

impl Sparkline {
    /// Keeps the last `max_points` finite values of `trail`
    pub fn from_trail(trail: &[f64], max_points: usize) -> Self {
        let finite: Vec<f64> = trail.iter().copied().filter(|v| v.is_finite()).collect();
        let skip = finite.len().saturating_sub(max_points);
        Self {
            points: finite[skip..].to_vec(),
        }
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn bounds(&self) -> (f64, f64) {
        let min = self.points.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max > min { max - min } else { 1.0 };
        (min, range)
    }

    /// Scales the points into a `width` x `height` box, y growing downwards
    pub fn normalized(&self, width: f64, height: f64) -> Vec<(f64, f64)> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let (min, range) = self.bounds();
        let step = if self.points.len() > 1 {
            width / (self.points.len() - 1) as f64
        } else {
            0.0
        };

        self.points
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64 * step, height - (v - min) / range * height))
            .collect()
    }

    /// Renders the points as unicode block characters
    pub fn to_unicode(&self) -> String {
        if self.points.is_empty() {
            return String::new();
        }
        let (min, range) = self.bounds();
        let top = (SPARK_LEVELS.len() - 1) as f64;
        self.points
            .iter()
            .map(|v| SPARK_LEVELS[((v - min) / range * top).round() as usize])
            .collect()
    }
}

/// One row of the coin table
#[derive(Debug, Clone, PartialEq)]
pub struct CoinRow {
    /// Absolute market-cap rank
    pub rank: u64,
    pub coin: CoinSnapshot,
    pub trend: Trend,
    pub sparkline: Sparkline,
}

/// One valued portfolio entry
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRow {
    pub entry: PortfolioEntry,
    /// Price used for valuation, in USD
    pub price_usd: f64,
    /// Whether `price_usd` came from the current snapshot
    pub live: bool,
    /// quantity × price, in USD; NaN for an invalid quantity
    pub value_usd: f64,
    pub image: String,
}

/// Portfolio rows and their grand total
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioValuation {
    pub rows: Vec<PortfolioRow>,
    /// Sum of row values, in USD
    pub total_usd: f64,
}

/// One entry of the alert list
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRow {
    pub alert: Alert,
    /// Coin name when the coin is on the current page, its identifier otherwise
    pub coin_label: String,
}

/// Summary cards above the table
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSummary {
    pub total_market_cap_usd: f64,
    pub total_volume_usd: f64,
    pub btc_dominance: Option<f64>,
    pub eth_dominance: Option<f64>,
    pub active_cryptocurrencies: u64,
}

impl From<&GlobalSnapshot> for MarketSummary {
    fn from(global: &GlobalSnapshot) -> Self {
        Self {
            total_market_cap_usd: global.total_market_cap_usd,
            total_volume_usd: global.total_volume_usd,
            btc_dominance: global.dominance("btc"),
            eth_dominance: global.dominance("eth"),
            active_cryptocurrencies: global.active_cryptocurrencies,
        }
    }
}

/// Everything the dashboard renders
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardView {
    pub summary: Option<MarketSummary>,
    pub coins: Vec<CoinRow>,
    pub portfolio: PortfolioValuation,
    pub alerts: Vec<AlertRow>,
    pub triggered: Vec<TriggeredAlert>,
}

/// Case-insensitive substring match against name or symbol
///
/// An empty term matches everything. Returns each match with its index in
/// the unfiltered list.
pub fn filter_coins<'a>(coins: &'a [CoinSnapshot], term: &str) -> Vec<(usize, &'a CoinSnapshot)> {
    let needle = term.to_lowercase();
    coins
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            needle.is_empty()
                || c.name.to_lowercase().contains(&needle)
                || c.symbol.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Values every portfolio entry against the current coin list
///
/// The live price is used when the coin is on the current page, then the
/// price cached at add-time, then zero.
pub fn value_portfolio(entries: &[PortfolioEntry], coins: &[CoinSnapshot]) -> PortfolioValuation {
    let rows: Vec<PortfolioRow> = entries
        .iter()
        .map(|entry| {
            let live_coin = coins.iter().find(|c| c.id == entry.id);
            let live_price = live_coin.and_then(|c| c.current_price);
            let price_usd = live_price.or(entry.price_usd).unwrap_or(0.0);
            let image = live_coin
                .map(|c| c.image.clone())
                .filter(|img| !img.is_empty())
                .unwrap_or_else(|| entry.image.clone());

            PortfolioRow {
                entry: entry.clone(),
                price_usd,
                live: live_price.is_some(),
                value_usd: entry.quantity * price_usd,
                image,
            }
        })
        .collect();

    let total_usd = rows.iter().map(|r| r.value_usd).sum();
    PortfolioValuation { rows, total_usd }
}

/// Composes the full dashboard view
///
/// Without a snapshot the coin table, summary and triggered list are empty
/// while the portfolio is valued at cached prices.
pub fn compose(
    market: Option<&MarketSnapshot>,
    portfolio: &[PortfolioEntry],
    alerts: &[Alert],
    search: &str,
) -> DashboardView {
    let coins: &[CoinSnapshot] = market.map(|m| m.coins.as_slice()).unwrap_or(&[]);

    let rows = match market {
        Some(m) => filter_coins(coins, search)
            .into_iter()
            .map(|(index, coin)| CoinRow {
                rank: m.page.rank_of(index),
                coin: coin.clone(),
                trend: Trend::classify(coin.price_change_percentage_24h),
                sparkline: Sparkline::from_trail(&coin.sparkline_7d, SPARKLINE_POINTS),
            })
            .collect(),
        None => Vec::new(),
    };

    let alert_rows = alerts
        .iter()
        .map(|alert| AlertRow {
            coin_label: coins
                .iter()
                .find(|c| c.id == alert.coin_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| alert.coin_id.clone()),
            alert: alert.clone(),
        })
        .collect();

    DashboardView {
        summary: market.map(|m| MarketSummary::from(&m.global)),
        coins: rows,
        portfolio: value_portfolio(portfolio, coins),
        alerts: alert_rows,
        triggered: evaluate(alerts, coins),
    }
}
