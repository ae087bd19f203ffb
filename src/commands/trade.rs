//! Trade command - run the pivot-band trading loop against CoinDCX

use anyhow::{Context, Result};
use tracing::info;

use crypto_trading_bot::config::AppConfig;
use crypto_trading_bot::TradingBot;

pub fn run(config: AppConfig, account: Option<String>) -> Result<()> {
    let bot_config = config.bot.clone();

    println!("\n{}", "=".repeat(60));
    println!("LIVE TRADING - REAL MONEY");
    println!("{}", "=".repeat(60));
    println!("  Symbol:      {}", bot_config.symbol());
    println!("  Interval:    {}", bot_config.interval);
    println!("  Indicators:  {:?}", config.indicators.provider);
    println!("  RSI buy/sell {} / {}", bot_config.rsi_buy_below, bot_config.rsi_sell_above);
    println!("  Max trades:  {}", bot_config.max_trades);
    println!("{}\n", "=".repeat(60));

    let runtime = super::runtime()?;
    runtime.block_on(async move {
        let client = super::exchange_client(&config, account.as_deref())?;
        let indicators = super::indicator_source(&config)?;
        let notifier = super::notifier(&config);

        let mut bot = TradingBot::new(client, indicators, notifier, bot_config)
            .context("Invalid bot configuration")?;
        let state = bot.run().await.context("Trading loop failed")?;

        info!(
            "Finished with {} trades, position open: {}",
            state.no_of_trades, state.open_position
        );
        if let Some(levels) = state.levels {
            info!("Final levels: {}", levels);
        }
        Ok(())
    })
}
