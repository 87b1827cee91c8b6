//! Client-local price alerts
//!
//! Alerts are armed thresholds on a coin's USD price. They carry no
//! triggered state: an alert whose condition holds fires again on every
//! applied poll tick until the user removes it.

use crate::{
    constants::STORAGE_ALERTS,
    currency::{Currency, ExchangeRate},
    error::{AlertError, StorageError},
    notify::{Notification, NotificationPermission, Notifier},
    storage::{load_list, save_list, KeyValueStorage},
    types::CoinSnapshot,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identifier assigned to an alert at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AlertId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Which side of the target price arms the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    /// Whether `price` satisfies this direction against `target`; both bounds inclusive
    pub fn is_triggered(&self, price: f64, target: f64) -> bool {
        match self {
            Direction::Above => price >= target,
            Direction::Below => price <= target,
        }
    }

    /// Comparison sign shown in alert lists
    pub fn sign(&self) -> &'static str {
        match self {
            Direction::Above => "≥",
            Direction::Below => "≤",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Above => write!(f, "above"),
            Direction::Below => write!(f, "below"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" => Ok(Direction::Above),
            "below" => Ok(Direction::Below),
            other => Err(format!("direction must be `above` or `below`, got `{}`", other)),
        }
    }
}

/// An armed price alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: AlertId,
    pub coin_id: String,
    /// Target price in USD
    pub target: f64,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}

/// An alert whose condition holds against the latest snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub alert_id: AlertId,
    pub coin_id: String,
    pub coin_name: String,
    pub symbol: String,
    pub price_usd: f64,
    pub target_usd: f64,
    pub direction: Direction,
}

impl TriggeredAlert {
    /// Builds the user notification, amounts shown in `currency`
    pub fn notification(&self, currency: Currency, rate: &ExchangeRate) -> Notification {
        Notification {
            title: format!("{} price alert", self.coin_name),
            body: format!(
                "{} is {} (target {})",
                self.symbol.to_uppercase(),
                rate.display(Some(self.price_usd), currency),
                rate.display(Some(self.target_usd), currency)
            ),
        }
    }
}

/// Checks every alert against a coin list
///
/// Alerts on coins missing from the list, or whose price is unknown, are
/// skipped.
pub fn evaluate(alerts: &[Alert], coins: &[CoinSnapshot]) -> Vec<TriggeredAlert> {
    alerts
        .iter()
        .filter_map(|alert| {
            let coin = coins.iter().find(|c| c.id == alert.coin_id)?;
            let price = coin.current_price?;
            alert
                .direction
                .is_triggered(price, alert.target)
                .then(|| TriggeredAlert {
                    alert_id: alert.alert_id,
                    coin_id: coin.id.clone(),
                    coin_name: coin.name.clone(),
                    symbol: coin.symbol.clone(),
                    price_usd: price,
                    target_usd: alert.target,
                    direction: alert.direction,
                })
        })
        .collect()
}

/// Alert list backed by a storage slot
pub struct AlertStore {
    storage: Arc<dyn KeyValueStorage>,
    notifier: Arc<dyn Notifier>,
    alerts: Vec<Alert>,
}

impl AlertStore {
    /// Loads the persisted alerts, starting empty if missing or malformed
    pub fn load(storage: Arc<dyn KeyValueStorage>, notifier: Arc<dyn Notifier>) -> Self {
        let alerts: Vec<Alert> = load_list(storage.as_ref(), STORAGE_ALERTS);
        tracing::debug!(count = alerts.len(), "Loaded alerts");
        Self {
            storage,
            notifier,
            alerts,
        }
    }

    /// Alerts in creation order
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn get(&self, alert_id: AlertId) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.alert_id == alert_id)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Arms a new alert and returns its identifier
    ///
    /// Asks for notification permission if the user has not decided yet.
    /// A non-finite target is rejected with [`AlertError::InvalidTarget`]
    /// before anything is stored.
    pub fn add(
        &mut self,
        coin_id: &str,
        target: f64,
        direction: Direction,
    ) -> Result<AlertId, AlertError> {
        if !target.is_finite() {
            return Err(AlertError::InvalidTarget(target));
        }

        let alert = Alert {
            alert_id: AlertId::new(),
            coin_id: coin_id.to_string(),
            target,
            direction,
            created_at: Utc::now(),
        };
        let alert_id = alert.alert_id;
        self.alerts.push(alert);

        tracing::info!(
            alert_id = %alert_id,
            coin = coin_id,
            target,
            direction = ?direction,
            "Alert armed"
        );

        if self.notifier.permission() == NotificationPermission::Default {
            let outcome = self.notifier.request_permission();
            tracing::debug!(permission = ?outcome, "Requested notification permission");
        }

        self.persist()?;
        Ok(alert_id)
    }

    /// Removes an alert by identifier
    pub fn remove(&mut self, alert_id: AlertId) -> Result<bool, StorageError> {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.alert_id != alert_id);
        if self.alerts.len() == before {
            return Ok(false);
        }
        tracing::info!(alert_id = %alert_id, "Alert removed");
        self.persist()?;
        Ok(true)
    }

    /// Evaluates all alerts against a coin list
    pub fn evaluate(&self, coins: &[CoinSnapshot]) -> Vec<TriggeredAlert> {
        evaluate(&self.alerts, coins)
    }

    /// Sends a notification per triggered alert while permission is granted
    ///
    /// Returns the number of notifications sent.
    pub fn dispatch(
        &self,
        triggered: &[TriggeredAlert],
        currency: Currency,
        rate: &ExchangeRate,
    ) -> usize {
        if triggered.is_empty() {
            return 0;
        }
        if self.notifier.permission() != NotificationPermission::Granted {
            tracing::debug!(
                count = triggered.len(),
                "Alerts triggered but notifications are not permitted"
            );
            return 0;
        }
        for t in triggered {
            self.notifier.notify(&t.notification(currency, rate));
        }
        triggered.len()
    }

    fn persist(&self) -> Result<(), StorageError> {
        save_list(self.storage.as_ref(), STORAGE_ALERTS, &self.alerts)
    }
}
