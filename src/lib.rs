//! # Crypto Dashboard
//!
//! A terminal cryptocurrency dashboard with a small signup/login backend.
//!
//! The dashboard polls CoinGecko for a page of ranked coins plus global
//! market statistics, converts prices into USD or INR using a rate fetched
//! once per session, and keeps a portfolio and a list of price alerts in
//! client-local storage.
//!
//! ## Usage
//!
//! ```no_run
//! use crypto_dashboard::{
//!     Dashboard, ExchangeRate, ExchangeRateHostProvider, FileStorage, LogNotifier, MarketPoller,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let poller = Arc::new(MarketPoller::new()?);
//! let mut events = poller.subscribe();
//! let _handle = poller.start()?;
//!
//! let rate = ExchangeRate::fetch_or_fallback(&ExchangeRateHostProvider::new()?).await;
//! let storage = Arc::new(FileStorage::open(".crypto-dashboard")?);
//! let dashboard = Dashboard::load(storage, Arc::new(LogNotifier::new()), rate);
//!
//! while events.recv().await.is_ok() {
//!     let snapshot = poller.snapshot().await;
//!     if let Some(snapshot) = &snapshot {
//!         dashboard.on_snapshot(snapshot);
//!     }
//!     println!("{}", dashboard.render(snapshot.as_deref()));
//! }
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod auth;
pub mod config;
pub mod constants;
pub mod currency;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod poller;
pub mod portfolio;
pub mod provider;
pub mod providers;
pub mod render;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use alerts::{Alert, AlertId, AlertStore, Direction, TriggeredAlert};
pub use currency::{format_currency, Currency, ExchangeRate, RateSource};
pub use dashboard::Dashboard;
pub use error::{
    AlertError, ConfigError, PollerError, ProviderError, SessionError, StorageError,
    UserStoreError,
};
pub use metrics::PollMetrics;
pub use notify::{LogNotifier, Notification, NotificationPermission, Notifier};
pub use poller::{MarketPoller, PollerHandle};
pub use portfolio::{PortfolioEntry, PortfolioStore};
pub use providers::{CoinGeckoProvider, ExchangeRateHostProvider};
pub use session::{AuthClient, Session, SessionStore};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use types::{
    CoinSnapshot, ComponentHealth, GlobalSnapshot, HealthStatus, MarketEvent, MarketSnapshot,
    PageRequest,
};
pub use view::{compose, DashboardView};
