//! In-memory market state with generation-checked replacement

use crate::types::MarketSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Latest market snapshot, replaced whole on every applied poll tick
///
/// Every request is stamped with a generation number when issued. A response
/// is only applied if no newer request was issued (and no invalidation
/// happened) in the meantime, so the snapshot always reflects the most recent
/// request rather than the most recent response.
pub struct MarketState {
    snapshot: RwLock<Option<Arc<MarketSnapshot>>>,
    generation: AtomicU64,
}

impl MarketState {
    /// Creates an empty market state
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Stamps a new request and returns its generation
    pub fn issue(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Supersedes every in-flight request without issuing a new one
    pub fn invalidate(&self) -> u64 {
        self.issue()
    }

    /// The most recently issued generation
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replaces the snapshot if `generation` is still the latest
    ///
    /// # Returns
    /// `true` if the snapshot was applied, `false` if it was superseded
    pub async fn apply(&self, generation: u64, snapshot: MarketSnapshot) -> bool {
        let mut slot = self.snapshot.write().await;
        if generation != self.current_generation() {
            tracing::debug!(
                generation,
                latest = self.current_generation(),
                "Discarding superseded market snapshot"
            );
            return false;
        }
        tracing::debug!(
            generation,
            coins = snapshot.coins.len(),
            "Applied market snapshot"
        );
        *slot = Some(Arc::new(snapshot));
        true
    }

    /// Gets the latest applied snapshot
    pub async fn snapshot(&self) -> Option<Arc<MarketSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Checks if any snapshot was applied yet
    pub async fn has_snapshot(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// Checks if the snapshot is older than `threshold_secs` or missing
    pub async fn is_stale(&self, threshold_secs: u64) -> bool {
        match self.snapshot.read().await.as_ref() {
            Some(snapshot) => snapshot.is_stale(threshold_secs),
            None => true,
        }
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{coin, global};
    use crate::types::PageRequest;

    fn snapshot(price: f64) -> MarketSnapshot {
        MarketSnapshot::new(
            vec![coin("bitcoin", "Bitcoin", "btc", price)],
            global(),
            PageRequest::default(),
        )
    }

    #[tokio::test]
    async fn test_latest_generation_is_applied() {
        let state = MarketState::new();
        let generation = state.issue();
        assert!(state.apply(generation, snapshot(1.0)).await);

        let applied = state.snapshot().await.unwrap();
        assert_eq!(applied.coin("bitcoin").unwrap().current_price, Some(1.0));
    }

    #[tokio::test]
    async fn test_superseded_generation_is_discarded() {
        let state = MarketState::new();
        let old = state.issue();
        let new = state.issue();

        // the newer request resolves first, the older one arrives late
        assert!(state.apply(new, snapshot(2.0)).await);
        assert!(!state.apply(old, snapshot(1.0)).await);

        let applied = state.snapshot().await.unwrap();
        assert_eq!(applied.coin("bitcoin").unwrap().current_price, Some(2.0));
    }

    #[tokio::test]
    async fn test_invalidate_discards_in_flight() {
        let state = MarketState::new();
        let generation = state.issue();
        state.invalidate();
        assert!(!state.apply(generation, snapshot(1.0)).await);
        assert!(!state.has_snapshot().await);
        assert!(state.is_stale(60).await);
    }
}
