//! Client-local portfolio store
//!
//! Holds the coins the user tracks and how much of each they hold. The list
//! is loaded once from storage and written back whole after every mutation.

use crate::{
    constants::STORAGE_PORTFOLIO,
    error::StorageError,
    storage::{load_list, save_list, KeyValueStorage},
    types::CoinSnapshot,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A held coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    /// Coin identifier, resolved against the latest snapshot by lookup
    pub id: String,

    /// Ticker symbol captured when the coin was added
    pub symbol: String,

    /// Display name captured when the coin was added
    pub name: String,

    /// Image URL captured when the coin was added
    #[serde(default)]
    pub image: String,

    /// Held quantity; NaN when the user typed something that is not a number
    #[serde(rename = "qty", with = "nan_as_null")]
    pub quantity: f64,

    /// Last-known USD price, used when the coin is not in the current page
    pub price_usd: Option<f64>,
}

impl PortfolioEntry {
    /// A fresh zero-quantity entry for `coin`
    pub fn from_coin(coin: &CoinSnapshot) -> Self {
        Self {
            id: coin.id.clone(),
            symbol: coin.symbol.clone(),
            name: coin.name.clone(),
            image: coin.image.clone(),
            quantity: 0.0,
            price_usd: coin.current_price,
        }
    }
}

/// JSON has no NaN, so non-finite quantities are stored as `null`
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Coerces user-typed quantity text into a number
///
/// Whitespace is ignored and empty input is zero. Anything that does not
/// parse as a finite decimal (including `inf` and `nan` spellings) becomes
/// NaN, which then shows up as an invalid total instead of being silently
/// replaced.
pub fn coerce_quantity(input: &str) -> f64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => f64::NAN,
    }
}

/// Portfolio list backed by a storage slot
pub struct PortfolioStore {
    storage: Arc<dyn KeyValueStorage>,
    entries: Vec<PortfolioEntry>,
}

impl PortfolioStore {
    /// Loads the persisted portfolio, starting empty if it is missing or malformed
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let entries: Vec<PortfolioEntry> = load_list(storage.as_ref(), STORAGE_PORTFOLIO);
        tracing::debug!(count = entries.len(), "Loaded portfolio");
        Self { storage, entries }
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[PortfolioEntry] {
        &self.entries
    }

    /// Looks up an entry by coin identifier
    pub fn get(&self, id: &str) -> Option<&PortfolioEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a coin with quantity zero
    ///
    /// Returns `false` without touching storage when the coin is already held.
    pub fn add(&mut self, coin: &CoinSnapshot) -> Result<bool, StorageError> {
        if self.get(&coin.id).is_some() {
            return Ok(false);
        }
        self.entries.push(PortfolioEntry::from_coin(coin));
        tracing::info!(coin = %coin.id, "Added coin to portfolio");
        self.persist()?;
        Ok(true)
    }

    /// Removes the entry for a coin
    pub fn remove(&mut self, id: &str) -> Result<bool, StorageError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Ok(false);
        }
        tracing::info!(coin = %id, "Removed coin from portfolio");
        self.persist()?;
        Ok(true)
    }

    /// Replaces the held quantity of a coin
    ///
    /// Infinite quantities are stored as NaN, the only non-finite value the
    /// slot can hold.
    pub fn set_quantity(&mut self, id: &str, quantity: f64) -> Result<bool, StorageError> {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        entry.quantity = if quantity.is_finite() { quantity } else { f64::NAN };
        tracing::debug!(coin = %id, quantity, "Updated portfolio quantity");
        self.persist()?;
        Ok(true)
    }

    /// Replaces the held quantity of a coin from user-typed text
    pub fn set_quantity_input(&mut self, id: &str, input: &str) -> Result<bool, StorageError> {
        self.set_quantity(id, coerce_quantity(input))
    }

    fn persist(&self) -> Result<(), StorageError> {
        save_list(self.storage.as_ref(), STORAGE_PORTFOLIO, &self.entries)
    }
}
