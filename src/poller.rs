//! Market-data poller
//!
//! Fetches a page of ranked coins plus the global statistics on a fixed
//! interval and whenever the page parameters change, replacing the market
//! state whole on each successful tick.

use crate::{
    constants::{POLL_INTERVAL_SECS, STALE_THRESHOLD_SECS},
    error::{PollerError, ProviderError},
    metrics::{MetricsCollector, PollMetrics, PollOutcome},
    provider::MarketDataProvider,
    providers::CoinGeckoProvider,
    store::MarketState,
    types::{ComponentHealth, HealthStatus, MarketEvent, MarketSnapshot, PageRequest},
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Capacity of the event channel; slow subscribers see `Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Market-data poller
///
/// # Example
/// ```no_run
/// use crypto_dashboard::{MarketPoller, PageRequest};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let poller = Arc::new(MarketPoller::new()?);
/// let handle = poller.start()?;
///
/// poller.set_page(PageRequest::new(2, 50)?);
/// if let Some(snapshot) = poller.snapshot().await {
///     println!("{} coins", snapshot.coins.len());
/// }
///
/// handle.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct MarketPoller {
    provider: Arc<dyn MarketDataProvider>,
    state: Arc<MarketState>,
    metrics: Arc<MetricsCollector>,
    page_tx: watch::Sender<PageRequest>,
    events: broadcast::Sender<MarketEvent>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl MarketPoller {
    /// Creates a poller against CoinGecko for the first page
    pub fn new() -> Result<Self, ProviderError> {
        let provider = Arc::new(CoinGeckoProvider::new()?);
        Ok(Self::with_provider(provider, PageRequest::default()))
    }

    /// Creates a poller with a custom provider and initial page
    pub fn with_provider(provider: Arc<dyn MarketDataProvider>, page: PageRequest) -> Self {
        let metrics = Arc::new(MetricsCollector::new(provider.provider_name()));
        let (page_tx, _) = watch::channel(page);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            provider,
            state: Arc::new(MarketState::new()),
            metrics,
            page_tx,
            events,
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Page currently being polled
    pub fn page(&self) -> PageRequest {
        *self.page_tx.borrow()
    }

    /// Switches to another page
    ///
    /// Any in-flight request for the previous parameters is superseded and
    /// the background task re-arms its interval, fetching immediately.
    pub fn set_page(&self, page: PageRequest) {
        if self.page() == page {
            return;
        }
        // publish the page before invalidating so a request stamped after
        // the invalidation always reads the new parameters
        self.page_tx.send_replace(page);
        let generation = self.state.invalidate();
        tracing::info!(
            page = page.page,
            per_page = page.per_page,
            generation,
            "Market page changed"
        );
    }

    /// Runs one poll tick
    ///
    /// # Returns
    /// `Ok(true)` if the snapshot was applied, `Ok(false)` if it was
    /// superseded while in flight, or the fetch error. On error the previous
    /// snapshot stays in place.
    pub async fn poll_once(&self) -> Result<bool, ProviderError> {
        let generation = self.state.issue();
        let page = self.page();
        let start = Instant::now();

        match self.provider.fetch_snapshot(page).await {
            Ok(snapshot) => {
                let coin_count = snapshot.coins.len();
                if self.state.apply(generation, snapshot).await {
                    self.metrics.record(start.elapsed(), PollOutcome::Applied).await;
                    tracing::debug!(
                        generation,
                        coin_count,
                        provider = self.provider.provider_name(),
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Market snapshot applied"
                    );
                    self.publish(MarketEvent::SnapshotApplied {
                        generation,
                        page,
                        coin_count,
                        timestamp: Utc::now(),
                    });
                    Ok(true)
                } else {
                    self.metrics.record(start.elapsed(), PollOutcome::Discarded).await;
                    self.publish(MarketEvent::SnapshotDiscarded {
                        generation,
                        page,
                        timestamp: Utc::now(),
                    });
                    Ok(false)
                }
            }
            Err(e) => {
                tracing::warn!(
                    generation,
                    page = page.page,
                    per_page = page.per_page,
                    error = %e,
                    "Failed to fetch market data, keeping previous snapshot"
                );
                self.metrics.record(start.elapsed(), PollOutcome::Failed).await;
                self.publish(MarketEvent::FetchFailed {
                    generation,
                    page,
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    fn publish(&self, event: MarketEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Latest applied snapshot, if any
    pub async fn snapshot(&self) -> Option<Arc<MarketSnapshot>> {
        self.state.snapshot().await
    }

    /// Subscribes to poller events
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Arms the background polling task
    ///
    /// The task ticks immediately, then every interval. Dropping (or calling
    /// `shutdown` on) the returned handle tears it down. Only one task may
    /// run per poller; the slot frees once the task has actually exited.
    pub fn start(self: &Arc<Self>) -> Result<PollerHandle, PollerError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(PollerError::AlreadyRunning);
        }

        let poller = Arc::clone(self);
        let page_rx = self.page_tx.subscribe();
        let guard = RunningGuard(Arc::clone(&self.running));
        let task = tokio::spawn(async move {
            let _guard = guard;
            poller.run(page_rx).await;
        });

        Ok(PollerHandle { task })
    }

    async fn run(&self, mut page_rx: watch::Receiver<PageRequest>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            provider = self.provider.provider_name(),
            "Starting market poller"
        );

        loop {
            let page = *page_rx.borrow_and_update();
            tracing::debug!(page = page.page, per_page = page.per_page, "Arming poll interval");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            // failures are logged and published inside poll_once
                            _ = self.poll_once() => {}
                            changed = page_rx.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                                tracing::debug!("Page changed mid-flight, dropping request");
                                break;
                            }
                        }
                    }
                    changed = page_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Gets tick metrics including latency percentiles and success rate
    pub async fn metrics(&self) -> PollMetrics {
        self.metrics.snapshot().await
    }

    /// Perform a health check on the poller
    ///
    /// Unhealthy without any snapshot, degraded when the latest snapshot is
    /// older than the stale threshold.
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();
        let snapshot = self.snapshot().await;
        let page = self.page();

        details.insert(
            "provider_name".to_string(),
            serde_json::json!(self.provider_name()),
        );
        details.insert("page".to_string(), serde_json::json!(page.page));
        details.insert("per_page".to_string(), serde_json::json!(page.per_page));
        details.insert(
            "running".to_string(),
            serde_json::json!(self.running.load(Ordering::Acquire)),
        );

        let status = match &snapshot {
            None => HealthStatus::Unhealthy,
            Some(s) if s.is_stale(STALE_THRESHOLD_SECS) => HealthStatus::Degraded,
            Some(_) => HealthStatus::Healthy,
        };

        if let Some(s) = &snapshot {
            details.insert("coins".to_string(), serde_json::json!(s.coins.len()));
            details.insert(
                "fetched_at".to_string(),
                serde_json::json!(s.fetched_at.to_rfc3339()),
            );
        }

        let message = match status {
            HealthStatus::Healthy => "Market data is fresh".to_string(),
            HealthStatus::Degraded => format!(
                "Market data is older than {} seconds",
                STALE_THRESHOLD_SECS
            ),
            HealthStatus::Unhealthy => "No market data fetched yet".to_string(),
        };

        ComponentHealth {
            name: "market_poller".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }
}

/// Clears the running flag when the poll task's future is dropped, whether
/// it returned, panicked or was aborted
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owner of a running poll task; dropping it stops the task
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops the background task
    pub fn shutdown(self) {}

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::info!("Market poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{coin, MockProvider};

    fn poller(provider: Arc<MockProvider>) -> Arc<MarketPoller> {
        Arc::new(MarketPoller::with_provider(provider, PageRequest::default()))
    }

    #[tokio::test]
    async fn test_poll_once_applies_snapshot() {
        let provider = Arc::new(MockProvider::new());
        provider.set_page(1, vec![coin("bitcoin", "Bitcoin", "btc", 50_000.0)]);
        let poller = poller(provider);

        assert!(poller.poll_once().await.unwrap());
        let snapshot = poller.snapshot().await.unwrap();
        assert_eq!(snapshot.coins.len(), 1);
        assert_eq!(snapshot.page, PageRequest::default());
        assert_eq!(snapshot.global.active_cryptocurrencies, 14_000);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let provider = Arc::new(MockProvider::new());
        provider.set_page(1, vec![coin("bitcoin", "Bitcoin", "btc", 50_000.0)]);
        let poller = poller(provider.clone());
        let mut events = poller.subscribe();

        poller.poll_once().await.unwrap();
        provider.push_error(ProviderError::ApiError("HTTP 500".to_string()));
        assert!(poller.poll_once().await.is_err());

        let snapshot = poller.snapshot().await.unwrap();
        assert_eq!(snapshot.coins[0].id, "bitcoin");

        assert_eq!(events.recv().await.unwrap().event_type(), "SNAPSHOT_APPLIED");
        assert_eq!(events.recv().await.unwrap().event_type(), "FETCH_FAILED");

        let metrics = poller.metrics().await;
        assert_eq!(metrics.applied_ticks, 1);
        assert_eq!(metrics.failed_ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_after_page_change_is_discarded() {
        let provider = Arc::new(MockProvider::new());
        provider.set_page(1, vec![coin("bitcoin", "Bitcoin", "btc", 50_000.0)]);
        provider.set_page(2, vec![coin("dogecoin", "Dogecoin", "doge", 0.1)]);
        provider.set_delay(1, Duration::from_secs(5));
        let poller = poller(provider.clone());

        let slow = tokio::spawn({
            let poller = poller.clone();
            async move { poller.poll_once().await }
        });
        while provider.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        poller.set_page(PageRequest::new(2, 10).unwrap());
        assert!(poller.poll_once().await.unwrap());

        // page 1 resolves last but was issued first
        assert!(!slow.await.unwrap().unwrap());

        let snapshot = poller.snapshot().await.unwrap();
        assert_eq!(snapshot.page.page, 2);
        assert_eq!(snapshot.coins[0].id, "dogecoin");
        assert_eq!(poller.metrics().await.discarded_ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_polls_on_interval() {
        let provider = Arc::new(MockProvider::new());
        provider.set_page(1, vec![coin("bitcoin", "Bitcoin", "btc", 50_000.0)]);
        let poller = poller(provider.clone());
        let mut events = poller.subscribe();

        let started = tokio::time::Instant::now();
        let handle = poller.start().unwrap();

        assert_eq!(events.recv().await.unwrap().event_type(), "SNAPSHOT_APPLIED");
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(events.recv().await.unwrap().event_type(), "SNAPSHOT_APPLIED");
        assert!(started.elapsed() >= Duration::from_secs(POLL_INTERVAL_SECS));
        assert_eq!(provider.call_count(), 2);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_change_rearms_immediately() {
        let provider = Arc::new(MockProvider::new());
        provider.set_page(1, vec![coin("bitcoin", "Bitcoin", "btc", 50_000.0)]);
        provider.set_page(3, vec![coin("tron", "TRON", "trx", 0.1)]);
        let poller = poller(provider);
        let mut events = poller.subscribe();
        let _handle = poller.start().unwrap();

        events.recv().await.unwrap();
        let changed_at = tokio::time::Instant::now();
        poller.set_page(PageRequest::new(3, 10).unwrap());

        match events.recv().await.unwrap() {
            MarketEvent::SnapshotApplied { page, .. } => assert_eq!(page.page, 3),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(changed_at.elapsed() < Duration::from_secs(POLL_INTERVAL_SECS));
    }

    #[tokio::test]
    async fn test_single_background_task() {
        let poller = poller(Arc::new(MockProvider::new()));

        let handle = poller.start().unwrap();
        assert!(matches!(poller.start(), Err(PollerError::AlreadyRunning)));

        drop(handle);
        wait_until_stopped(&poller).await;
        let again = poller.start();
        assert!(again.is_ok());
    }

    async fn wait_until_stopped(poller: &MarketPoller) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while poller.running.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_running_clears_only_after_task_exits() {
        let poller = poller(Arc::new(MockProvider::new()));
        let handle = poller.start().unwrap();
        tokio::task::yield_now().await;
        assert!(poller.running.load(Ordering::Acquire));

        handle.shutdown();
        wait_until_stopped(&poller).await;
        assert_eq!(Arc::strong_count(&poller), 1);
        assert!(poller.start().is_ok());
    }

    #[tokio::test]
    async fn test_health_check() {
        let provider = Arc::new(MockProvider::new());
        let poller = poller(provider);
        assert_eq!(poller.health_check().await.status, HealthStatus::Unhealthy);

        poller.poll_once().await.unwrap();
        let health = poller.health_check().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.details["coins"], serde_json::json!(0));
    }
}
