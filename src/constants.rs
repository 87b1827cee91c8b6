//! Constants for the crypto dashboard
//!
//! Defaults for the poller, upstream APIs, persisted slots and the auth
//! backend live here. A handful of them can be overridden from the
//! environment, see the `config` module.

/// How often the market-data poller fetches a fresh snapshot (in seconds)
pub const POLL_INTERVAL_SECS: u64 = 10;

/// How long before the last applied snapshot is reported as stale (in seconds)
pub const STALE_THRESHOLD_SECS: u64 = 3 * POLL_INTERVAL_SECS;

/// HTTP request timeout for upstream APIs (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of coins per page
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Page sizes offered by the dashboard
pub const PER_PAGE_OPTIONS: &[u32] = &[10, 50, 100];

/// Number of trailing 7-day points drawn in a sparkline
pub const SPARKLINE_POINTS: usize = 30;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint for ranked coin market snapshots
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// CoinGecko endpoint for global market statistics
pub const COINGECKO_GLOBAL_ENDPOINT: &str = "/global";

/// Exchange-rate API base URL
pub const EXCHANGE_RATE_API_URL: &str = "https://api.exchangerate.host";

/// INR per USD used when the exchange-rate fetch fails
pub const FALLBACK_INR_RATE: f64 = 82.0;

/// Default base URL of the auth backend as seen by the dashboard client
pub const AUTH_API_URL: &str = "http://localhost:5000";

/// Storage slot holding the serialized portfolio list
pub const STORAGE_PORTFOLIO: &str = "crypto_portfolio_v2";

/// Storage slot holding the serialized alert list
pub const STORAGE_ALERTS: &str = "crypto_alerts_v1";

/// Storage slot holding the logged-in user
pub const STORAGE_SESSION: &str = "user";

/// Default directory for the file-backed key-value storage
pub const DEFAULT_STORAGE_DIR: &str = ".crypto-dashboard";

/// Default listen port of the auth backend
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default database of the auth backend
pub const DEFAULT_DATABASE_URL: &str = "sqlite://users.db?mode=rwc";

/// bcrypt work factor used for stored passwords
pub const BCRYPT_COST: u32 = 10;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "crypto-dashboard/0.1.0";
