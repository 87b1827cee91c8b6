//! Dashboard controller
//!
//! Ties the client-local stores to the market feed: every applied snapshot
//! is checked against the alerts, and the view is composed on demand from
//! the latest snapshot plus the stores' current contents.

use crate::{
    alerts::{AlertStore, TriggeredAlert},
    currency::{Currency, ExchangeRate},
    notify::Notifier,
    portfolio::PortfolioStore,
    render::render,
    storage::KeyValueStorage,
    types::MarketSnapshot,
    view::{compose, DashboardView},
};
use std::sync::Arc;

pub struct Dashboard {
    portfolio: PortfolioStore,
    alerts: AlertStore,
    currency: Currency,
    rate: ExchangeRate,
    search: String,
}

impl Dashboard {
    /// Loads both stores from `storage`; display currency starts as USD
    pub fn load(
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn Notifier>,
        rate: ExchangeRate,
    ) -> Self {
        Self {
            portfolio: PortfolioStore::load(storage.clone()),
            alerts: AlertStore::load(storage, notifier),
            currency: Currency::USD,
            rate,
            search: String::new(),
        }
    }

    pub fn portfolio(&self) -> &PortfolioStore {
        &self.portfolio
    }

    pub fn portfolio_mut(&mut self) -> &mut PortfolioStore {
        &mut self.portfolio
    }

    pub fn alerts(&self) -> &AlertStore {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut AlertStore {
        &mut self.alerts
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn set_currency(&mut self, currency: Currency) {
        self.currency = currency;
    }

    pub fn rate(&self) -> &ExchangeRate {
        &self.rate
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    /// Evaluates alerts against a freshly applied snapshot and notifies
    ///
    /// Returns every triggered alert, whether or not a notification was
    /// allowed.
    pub fn on_snapshot(&self, snapshot: &MarketSnapshot) -> Vec<TriggeredAlert> {
        let triggered = self.alerts.evaluate(&snapshot.coins);
        let sent = self.alerts.dispatch(&triggered, self.currency, &self.rate);
        if !triggered.is_empty() {
            tracing::info!(triggered = triggered.len(), sent, "Price alerts fired");
        }
        triggered
    }

    pub fn view(&self, market: Option<&MarketSnapshot>) -> DashboardView {
        compose(
            market,
            self.portfolio.entries(),
            self.alerts.alerts(),
            &self.search,
        )
    }

    /// Composes and renders the view as text
    pub fn render(&self, market: Option<&MarketSnapshot>) -> String {
        render(&self.view(market), self.currency, &self.rate)
    }
}
