//! Plain-text rendering of a [`DashboardView`] for the terminal

use crate::alerts::TriggeredAlert;
use crate::currency::{Currency, ExchangeRate, PLACEHOLDER};
use crate::view::{DashboardView, MarketSummary, Trend};
use std::fmt::Write;

/// Renders the whole dashboard, amounts converted into `currency`
pub fn render(view: &DashboardView, currency: Currency, rate: &ExchangeRate) -> String {
    let mut out = String::new();

    match &view.summary {
        Some(summary) => write_summary(&mut out, summary, currency, rate),
        None => out.push_str("Waiting for market data...\n"),
    }

    out.push('\n');
    write_coins(&mut out, view, currency, rate);
    out.push('\n');
    write_portfolio(&mut out, view, currency, rate);
    out.push('\n');
    write_alerts(&mut out, view, currency, rate);

    out
}

/// Only the portfolio panel, for listing without live prices
pub fn render_portfolio(view: &DashboardView, currency: Currency, rate: &ExchangeRate) -> String {
    let mut out = String::new();
    write_portfolio(&mut out, view, currency, rate);
    out
}

/// Only the alert list
pub fn render_alerts(view: &DashboardView, currency: Currency, rate: &ExchangeRate) -> String {
    let mut out = String::new();
    write_alerts(&mut out, view, currency, rate);
    out
}

/// One line per triggered alert
pub fn render_triggered(triggered: &[TriggeredAlert], currency: Currency, rate: &ExchangeRate) -> String {
    triggered
        .iter()
        .map(|t| {
            let n = t.notification(currency, rate);
            format!("[ALERT] {}: {}\n", n.title, n.body)
        })
        .collect()
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.2}%", v),
        _ => PLACEHOLDER.to_string(),
    }
}

fn write_summary(out: &mut String, summary: &MarketSummary, currency: Currency, rate: &ExchangeRate) {
    let dominance = |v: Option<f64>| match v {
        Some(v) => format!("{:.2}%", v),
        None => PLACEHOLDER.to_string(),
    };

    let _ = writeln!(
        out,
        "Market cap: {}   24h volume: {}",
        rate.display(Some(summary.total_market_cap_usd), currency),
        rate.display(Some(summary.total_volume_usd), currency)
    );
    let _ = writeln!(
        out,
        "BTC dominance: {}   ETH dominance: {}   Active coins: {}",
        dominance(summary.btc_dominance),
        dominance(summary.eth_dominance),
        summary.active_cryptocurrencies
    );
}

fn write_coins(out: &mut String, view: &DashboardView, currency: Currency, rate: &ExchangeRate) {
    let _ = writeln!(
        out,
        "{:>4}  {:<20} {:<6} {:>18} {:>9} {:>22}  7d",
        "#", "Coin", "Symbol", "Price", "24h", "Market cap"
    );

    if view.coins.is_empty() {
        out.push_str("  (no coins)\n");
        return;
    }

    for row in &view.coins {
        let marker = match row.trend {
            Trend::Up => '▲',
            Trend::Down => '▼',
        };
        let _ = writeln!(
            out,
            "{:>4}  {:<20} {:<6} {:>18} {:>8}{} {:>22}  {}",
            row.rank,
            row.coin.name,
            row.coin.symbol.to_uppercase(),
            rate.display(row.coin.current_price, currency),
            percent(row.coin.price_change_percentage_24h),
            marker,
            rate.display(row.coin.market_cap, currency),
            row.sparkline.to_unicode()
        );
    }
}

fn write_portfolio(out: &mut String, view: &DashboardView, currency: Currency, rate: &ExchangeRate) {
    out.push_str("Portfolio\n");
    if view.portfolio.rows.is_empty() {
        out.push_str("  (empty)\n");
        return;
    }

    for row in &view.portfolio.rows {
        let _ = writeln!(
            out,
            "  {:<20} {:<6} qty {:<12} @ {:>16}{} = {}",
            row.entry.name,
            row.entry.symbol.to_uppercase(),
            row.entry.quantity,
            rate.display(Some(row.price_usd), currency),
            if row.live { "" } else { " (cached)" },
            rate.display(Some(row.value_usd), currency)
        );
    }
    let _ = writeln!(
        out,
        "  Total: {}",
        rate.display(Some(view.portfolio.total_usd), currency)
    );
}

fn write_alerts(out: &mut String, view: &DashboardView, currency: Currency, rate: &ExchangeRate) {
    out.push_str("Alerts\n");
    if view.alerts.is_empty() {
        out.push_str("  (none)\n");
    }

    for row in &view.alerts {
        let _ = writeln!(
            out,
            "  {}  {} {} {} {}",
            row.alert.alert_id,
            row.coin_label,
            row.alert.direction.sign(),
            rate.display(Some(row.alert.target), currency),
            row.alert.direction
        );
    }

    out.push_str(&render_triggered(&view.triggered, currency, rate));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{Alert, AlertId, Direction};
    use crate::portfolio::PortfolioEntry;
    use crate::provider::mock::{coin, global};
    use crate::types::{MarketSnapshot, PageRequest};
    use crate::view::compose;
    use chrono::Utc;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot::new(
            vec![
                coin("bitcoin", "Bitcoin", "btc", 50000.0),
                coin("ethereum", "Ethereum", "eth", 3000.0),
            ],
            global(),
            PageRequest::default(),
        )
    }

    fn alert() -> Alert {
        Alert {
            alert_id: AlertId::new(),
            coin_id: "bitcoin".to_string(),
            target: 49000.0,
            direction: Direction::Above,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_usd() {
        let market = snapshot();
        let mut entry = PortfolioEntry::from_coin(&market.coins[0]);
        entry.quantity = 2.0;
        let alert = alert();
        let view = compose(Some(&market), &[entry], &[alert.clone()], "");

        let text = render(&view, Currency::USD, &ExchangeRate::live(80.0));
        assert!(text.contains("Bitcoin"));
        assert!(text.contains("BTC"));
        assert!(text.contains("$50,000.00"));
        assert!(text.contains("+1.50%"));
        assert!(text.contains("Total: $100,000.00"));
        assert!(text.contains(&alert.alert_id.to_string()));
        assert!(text.contains("[ALERT] Bitcoin price alert"));
    }

    #[test]
    fn test_render_inr_uses_rate() {
        let market = snapshot();
        let view = compose(Some(&market), &[], &[], "");

        let text = render(&view, Currency::INR, &ExchangeRate::live(80.0));
        assert!(text.contains("₹40,00,000.00"));
        assert!(!text.contains("$50,000.00"));
    }

    #[test]
    fn test_render_without_snapshot() {
        let view = compose(None, &[], &[], "");
        let text = render(&view, Currency::USD, &ExchangeRate::fallback());
        assert!(text.starts_with("Waiting for market data"));
        assert!(text.contains("(no coins)"));
        assert!(text.contains("(empty)"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn test_percent_placeholder() {
        assert_eq!(percent(None), PLACEHOLDER);
        assert_eq!(percent(Some(f64::NAN)), PLACEHOLDER);
        assert_eq!(percent(Some(-2.5)), "-2.50%");
    }
}
