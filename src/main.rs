//! CoinDCX trading bot - main entry point
//!
//! Subcommands cover the trading loop, one-shot exchange calls, indicator
//! lookups, CSV reports and credential management.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crypto_trading_bot::coindcx::OrderSide;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "crypto-trading-bot")]
#[command(about = "CoinDCX trading bot with indicator-driven signals and credential storage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the trading loop (CAUTION - REAL MONEY!)
    Trade {
        /// Account to trade with (defaults to owner.username)
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Show the ticker of a market
    Ticker {
        /// Market symbol, e.g. "BTCUSDT"
        market: String,
    },

    /// List markets, optionally only those quoted in one currency
    Markets {
        /// Quote currency, e.g. "USDT"
        #[arg(short, long)]
        quote: Option<String>,
    },

    /// Show account balances priced against current tickers
    Balances {
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Place an order; a price makes it a limit order
    Order {
        side: OrderSide,
        market: String,
        quantity: f64,
        #[arg(short, long)]
        price: Option<f64>,
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Cancel one order by id
    Cancel {
        order_id: String,
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Cancel every open order in a market
    CancelAll {
        market: String,
        #[arg(short, long)]
        side: Option<OrderSide>,
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Change the price of an open limit order
    EditPrice {
        order_id: String,
        price: f64,
        #[arg(short, long)]
        account: Option<String>,
    },

    /// List open orders in a market
    ActiveOrders {
        market: String,
        #[arg(short, long)]
        side: Option<OrderSide>,
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Show recent fills
    TradeHistory {
        #[arg(short, long, default_value = "50")]
        limit: u32,
        /// Only trades after this trade id
        #[arg(long)]
        from_id: Option<i64>,
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Print the indicator snapshot of the configured (or given) symbol
    Indicators {
        /// Symbol, e.g. "ETHUSDT" (defaults to bot.coin_1 + bot.coin_2)
        #[arg(short, long)]
        symbol: Option<String>,
        /// Interval, e.g. "1h" (defaults to bot.interval)
        #[arg(short, long)]
        interval: Option<String>,
    },

    /// RSI buy/sell recommendation for a list of coins
    Recommend {
        /// Coins (comma-separated). E.g., "BTC,ETH,SOL"
        #[arg(long, default_value = "BTC,ETH,SOL")]
        coins: String,
        /// Mail the recommendations to the owner
        #[arg(long)]
        email: bool,
    },

    /// Alert when a market trades above a threshold
    PriceAlert {
        market: String,
        threshold: f64,
        /// Mail the alert to the owner
        #[arg(long)]
        email: bool,
    },

    /// Write today's market snapshot CSV
    Snapshot {
        /// Extra quote currencies to leave out (comma-separated)
        #[arg(long)]
        exclude: Option<String>,
    },

    /// List tracked markets whose RSI is below a threshold
    Scan {
        /// RSI threshold
        #[arg(long, default_value_t = 40.0)]
        below: f64,
        /// Quote currencies to leave out (comma-separated)
        #[arg(long, default_value = "BTC")]
        exclude: String,
        /// Exchange to retry a market on when the configured one fails
        #[arg(long, default_value = "Huobi")]
        fallback_exchange: String,
    },

    /// Mail an alert for free holdings whose RSI is above a threshold
    HoldingsAlert {
        #[arg(short, long)]
        account: Option<String>,
        /// RSI threshold
        #[arg(long, default_value_t = 70.0)]
        above: f64,
    },

    /// Compare the snapshot of a start date with today's
    WeekChange {
        /// Date of the initial snapshot (YYYY-MM-DD)
        #[arg(long)]
        since: String,
    },

    /// Manage stored exchange credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },

    /// Print a fresh base64 key for credential encryption
    GenKey,
}

#[derive(Subcommand, Debug)]
enum CredentialAction {
    /// Show the stored record of an account
    Get {
        #[command(flatten)]
        identity: commands::credentials::IdentityArgs,
    },
    /// Store a new account
    Add {
        #[command(flatten)]
        record: commands::credentials::RecordArgs,
    },
    /// Update the given fields of a stored account
    Update {
        #[command(flatten)]
        record: commands::credentials::RecordArgs,
    },
    /// Remove a stored account
    Delete {
        #[command(flatten)]
        identity: commands::credentials::IdentityArgs,
    },
}

fn setup_logging(verbose: bool, command_name: &str, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn,lettre=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Trade { .. } => "trade",
        Commands::Ticker { .. } => "ticker",
        Commands::Markets { .. } => "markets",
        Commands::Balances { .. } => "balances",
        Commands::Order { .. } => "order",
        Commands::Cancel { .. } => "cancel",
        Commands::CancelAll { .. } => "cancel_all",
        Commands::EditPrice { .. } => "edit_price",
        Commands::ActiveOrders { .. } => "active_orders",
        Commands::TradeHistory { .. } => "trade_history",
        Commands::Indicators { .. } => "indicators",
        Commands::Recommend { .. } => "recommend",
        Commands::PriceAlert { .. } => "price_alert",
        Commands::Snapshot { .. } => "snapshot",
        Commands::WeekChange { .. } => "week_change",
        Commands::Scan { .. } => "scan",
        Commands::HoldingsAlert { .. } => "holdings_alert",
        Commands::Credentials { .. } => "credentials",
        Commands::GenKey => "gen_key",
    };

    let config = commands::load_config(&cli.config)?;
    setup_logging(cli.verbose, command_name, &config.paths.log_dir)?;

    match cli.command {
        Commands::Trade { account } => commands::trade::run(config, account),

        Commands::Ticker { market } => commands::market::ticker(config, market),
        Commands::Markets { quote } => commands::market::markets(config, quote),
        Commands::Indicators { symbol, interval } => {
            commands::market::indicators(config, symbol, interval)
        }
        Commands::Recommend { coins, email } => commands::market::recommend(config, coins, email),
        Commands::PriceAlert {
            market,
            threshold,
            email,
        } => commands::market::price_alert(config, market, threshold, email),
        Commands::Snapshot { exclude } => commands::market::snapshot(config, exclude),
        Commands::WeekChange { since } => commands::market::week_change(config, since),
        Commands::Scan {
            below,
            exclude,
            fallback_exchange,
        } => commands::market::scan(config, below, exclude, fallback_exchange),

        Commands::HoldingsAlert { account, above } => {
            commands::account::holdings_alert(config, account, above)
        }

        Commands::Balances { account } => commands::account::balances(config, account),
        Commands::Order {
            side,
            market,
            quantity,
            price,
            account,
        } => commands::account::order(config, account, side, market, quantity, price),
        Commands::Cancel { order_id, account } => {
            commands::account::cancel(config, account, order_id)
        }
        Commands::CancelAll {
            market,
            side,
            account,
        } => commands::account::cancel_all(config, account, market, side),
        Commands::EditPrice {
            order_id,
            price,
            account,
        } => commands::account::edit_price(config, account, order_id, price),
        Commands::ActiveOrders {
            market,
            side,
            account,
        } => commands::account::active_orders(config, account, market, side),
        Commands::TradeHistory {
            limit,
            from_id,
            account,
        } => commands::account::trade_history(config, account, from_id, limit),

        Commands::Credentials { action } => match action {
            CredentialAction::Get { identity } => commands::credentials::get(config, identity),
            CredentialAction::Add { record } => commands::credentials::add(config, record),
            CredentialAction::Update { record } => commands::credentials::update(config, record),
            CredentialAction::Delete { identity } => {
                commands::credentials::delete(config, identity)
            }
        },
        Commands::GenKey => commands::credentials::gen_key(),
    }
}
