use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crypto_dashboard::{
    auth::models::{LoginRequest, SignupRequest},
    config::DashboardConfig,
    constants::{DEFAULT_PER_PAGE, PER_PAGE_OPTIONS},
    provider::MarketDataProvider,
    render::{render_alerts, render_portfolio},
    AlertId, AuthClient, CoinGeckoProvider, Currency, Dashboard, Direction, ExchangeRate,
    ExchangeRateHostProvider, FileStorage, KeyValueStorage, LogNotifier, MarketEvent,
    MarketPoller, Notifier, PageRequest, SessionStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crypto-dashboard", version, about = "Terminal cryptocurrency dashboard")]
struct Cli {
    /// Directory holding the portfolio, alerts and session
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account on the auth backend
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Poll the market and redraw the dashboard on every update
    Watch {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long, default_value = "USD")]
        currency: Currency,
        #[arg(long, default_value = "")]
        search: String,
        /// Stop after this many applied snapshots
        #[arg(long)]
        ticks: Option<usize>,
    },
    /// Manage tracked coins
    #[command(subcommand)]
    Portfolio(PortfolioCommand),
    /// Manage price alerts
    #[command(subcommand)]
    Alerts(AlertsCommand),
}

#[derive(Args, Clone, Copy)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: u32,
}

impl PageArgs {
    fn to_request(self) -> Result<PageRequest> {
        if !PER_PAGE_OPTIONS.contains(&self.per_page) {
            tracing::warn!(
                per_page = self.per_page,
                "Page size is not one of {:?}",
                PER_PAGE_OPTIONS
            );
        }
        Ok(PageRequest::new(self.page, self.per_page)?)
    }
}

#[derive(Subcommand)]
enum PortfolioCommand {
    /// Show holdings at their cached prices
    List {
        #[arg(long, default_value = "USD")]
        currency: Currency,
    },
    /// Track a coin found on the given market page
    Add {
        id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 100)]
        per_page: u32,
    },
    /// Stop tracking a coin
    Remove { id: String },
    /// Set the held quantity; anything that is not a number is kept as invalid
    Set { id: String, quantity: String },
}

#[derive(Subcommand)]
enum AlertsCommand {
    /// Show armed alerts
    List {
        #[arg(long, default_value = "USD")]
        currency: Currency,
    },
    /// Arm an alert on a coin's USD price
    Add {
        coin_id: String,
        price: f64,
        direction: Direction,
    },
    /// Remove an alert by identifier
    Remove { alert_id: AlertId },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = DashboardConfig::from_env();
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }

    let storage: Arc<dyn KeyValueStorage> = Arc::new(
        FileStorage::open(&config.storage_dir).with_context(|| {
            format!("Failed to open storage at {}", config.storage_dir.display())
        })?,
    );
    let sessions = SessionStore::new(storage.clone());

    match cli.command {
        Command::Signup {
            username,
            email,
            password,
        } => {
            let client = AuthClient::new(&config.auth_url)?;
            let message = client
                .signup(&SignupRequest {
                    username,
                    email,
                    password,
                })
                .await?;
            println!("{}", message);
        }
        Command::Login { email, password } => {
            let client = AuthClient::new(&config.auth_url)?;
            let session = client.login(&LoginRequest { email, password }).await?;
            sessions.save(&session).context("Failed to store session")?;
            println!("Logged in as {}", session.username);
        }
        Command::Logout => {
            sessions.clear().context("Failed to clear session")?;
            println!("Logged out");
        }
        Command::Watch {
            page,
            currency,
            search,
            ticks,
        } => {
            sessions.require()?;
            watch(&config, storage, page.to_request()?, currency, search, ticks).await?;
        }
        Command::Portfolio(command) => {
            sessions.require()?;
            portfolio(&config, storage, command).await?;
        }
        Command::Alerts(command) => {
            sessions.require()?;
            alerts(&config, storage, command).await?;
        }
    }

    Ok(())
}

/// Fetches the USD/INR rate only when it will actually be shown
async fn session_rate(config: &DashboardConfig, currency: Currency) -> Result<ExchangeRate> {
    if currency == Currency::USD {
        return Ok(ExchangeRate::default());
    }
    let provider = ExchangeRateHostProvider::with_base_url(&config.exchange_rate_url)?;
    Ok(ExchangeRate::fetch_or_fallback(&provider).await)
}

async fn watch(
    config: &DashboardConfig,
    storage: Arc<dyn KeyValueStorage>,
    page: PageRequest,
    currency: Currency,
    search: String,
    ticks: Option<usize>,
) -> Result<()> {
    let rate_provider = ExchangeRateHostProvider::with_base_url(&config.exchange_rate_url)?;
    let rate = ExchangeRate::fetch_or_fallback(&rate_provider).await;

    let notifier = Arc::new(LogNotifier::new());
    let mut dashboard = Dashboard::load(storage, notifier.clone(), rate);
    dashboard.set_currency(currency);
    dashboard.set_search(search);
    if !dashboard.alerts().is_empty() {
        notifier.request_permission();
    }

    let provider = Arc::new(CoinGeckoProvider::with_base_url(&config.coingecko_url)?);
    let poller = Arc::new(MarketPoller::with_provider(provider, page));
    let mut events = poller.subscribe();
    let handle = poller.start()?;

    let mut applied = 0usize;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(MarketEvent::SnapshotApplied { .. }) => {
                    let snapshot = poller.snapshot().await;
                    if let Some(snapshot) = &snapshot {
                        dashboard.on_snapshot(snapshot);
                    }
                    println!("{}", dashboard.render(snapshot.as_deref()));

                    applied += 1;
                    if ticks.is_some_and(|limit| applied >= limit) {
                        break;
                    }
                }
                Ok(event @ MarketEvent::FetchFailed { .. }) => {
                    eprintln!("{}; showing last known data", event);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dashboard fell behind the poller");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown();
    Ok(())
}

async fn portfolio(
    config: &DashboardConfig,
    storage: Arc<dyn KeyValueStorage>,
    command: PortfolioCommand,
) -> Result<()> {
    let notifier = Arc::new(LogNotifier::new());

    match command {
        PortfolioCommand::List { currency } => {
            let rate = session_rate(config, currency).await?;
            let dashboard = Dashboard::load(storage, notifier, rate);
            print!("{}", render_portfolio(&dashboard.view(None), currency, &rate));
        }
        PortfolioCommand::Add { id, page, per_page } => {
            let provider = CoinGeckoProvider::with_base_url(&config.coingecko_url)?;
            let coins = provider
                .fetch_markets(PageRequest::new(page, per_page)?)
                .await
                .context("Failed to fetch market page")?;
            let Some(coin) = coins.iter().find(|c| c.id == id) else {
                bail!("Coin {} is not on page {} ({} per page)", id, page, per_page);
            };

            let mut dashboard = Dashboard::load(storage, notifier, ExchangeRate::default());
            if dashboard.portfolio_mut().add(coin)? {
                println!("Added {} ({})", coin.name, coin.symbol.to_uppercase());
            } else {
                println!("{} is already in the portfolio", coin.name);
            }
        }
        PortfolioCommand::Remove { id } => {
            let mut dashboard = Dashboard::load(storage, notifier, ExchangeRate::default());
            if dashboard.portfolio_mut().remove(&id)? {
                println!("Removed {}", id);
            } else {
                println!("{} is not in the portfolio", id);
            }
        }
        PortfolioCommand::Set { id, quantity } => {
            let mut dashboard = Dashboard::load(storage, notifier, ExchangeRate::default());
            if dashboard.portfolio().get(&id).is_none() {
                bail!("{} is not in the portfolio", id);
            }
            dashboard.portfolio_mut().set_quantity_input(&id, &quantity)?;
            let entry = dashboard.portfolio().get(&id);
            match entry.map(|e| e.quantity) {
                Some(q) if q.is_nan() => println!("{} quantity is not a number", id),
                Some(q) => println!("{} quantity set to {}", id, q),
                None => {}
            }
        }
    }

    Ok(())
}

async fn alerts(
    config: &DashboardConfig,
    storage: Arc<dyn KeyValueStorage>,
    command: AlertsCommand,
) -> Result<()> {
    let notifier = Arc::new(LogNotifier::new());

    match command {
        AlertsCommand::List { currency } => {
            let rate = session_rate(config, currency).await?;
            let dashboard = Dashboard::load(storage, notifier, rate);
            print!("{}", render_alerts(&dashboard.view(None), currency, &rate));
        }
        AlertsCommand::Add {
            coin_id,
            price,
            direction,
        } => {
            if !price.is_finite() || price <= 0.0 {
                bail!("Target price must be a positive number");
            }
            let mut dashboard = Dashboard::load(storage, notifier, ExchangeRate::default());
            let alert_id = dashboard.alerts_mut().add(&coin_id, price, direction)?;
            println!("Alert {} armed: {} {} {}", alert_id, coin_id, direction, price);
        }
        AlertsCommand::Remove { alert_id } => {
            let mut dashboard = Dashboard::load(storage, notifier, ExchangeRate::default());
            if dashboard.alerts_mut().remove(alert_id)? {
                println!("Removed alert {}", alert_id);
            } else {
                println!("No alert with id {}", alert_id);
            }
        }
    }

    Ok(())
}
