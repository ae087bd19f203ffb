//! Market commands - tickers, indicators, alerts and market reports

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crypto_trading_bot::config::AppConfig;
use crypto_trading_bot::indicator::{IndicatorQuery, IndicatorSource, Interval};
use crypto_trading_bot::notify::Notifier;
use crypto_trading_bot::report::market::{
    find_snapshot, read_snapshot, week_number, write_snapshot, write_week_change,
};
use crypto_trading_bot::report::{market_rows, week_change as compute_week_change};
use crypto_trading_bot::scan::scan_markets;
use crypto_trading_bot::strategy::{price_alert as alert_text, Recommendation};

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn ticker(config: AppConfig, market: String) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::public_client(&config)?;
        let ticker = client.get_ticker(&market).await?;

        println!("{}", ticker.market);
        println!("  Last:   {}", ticker.last_price);
        println!("  Bid:    {}", ticker.bid);
        println!("  Ask:    {}", ticker.ask);
        println!("  Volume: {}", ticker.volume);
        if let Some(time) = ticker.datetime() {
            println!("  Time:   {}", time.format("%Y-%m-%d %H:%M:%S"));
        }
        Ok(())
    })
}

pub fn markets(config: AppConfig, quote: Option<String>) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::public_client(&config)?;
        match quote {
            Some(q) => {
                let details = client.get_markets_details_for_quote(&q.to_uppercase()).await?;
                println!(
                    "{:<14} {:<10} {:>14} {:>14} {:<8}",
                    "SYMBOL", "PAIR", "MIN QTY", "MIN NOTIONAL", "STATUS"
                );
                for m in &details {
                    println!(
                        "{:<14} {:<10} {:>14} {:>14} {:<8}",
                        m.symbol,
                        m.pair.as_deref().unwrap_or("-"),
                        m.min_quantity,
                        m.min_notional,
                        m.status
                    );
                }
                info!("{} markets quoted in {}", details.len(), q);
            }
            None => {
                let markets = client.get_markets().await?;
                for m in &markets {
                    println!("{}", m);
                }
                info!("{} markets", markets.len());
            }
        }
        Ok(())
    })
}

pub fn indicators(config: AppConfig, symbol: Option<String>, interval: Option<String>) -> Result<()> {
    let mut query = IndicatorQuery::from_config(&config.bot)?;
    if let Some(s) = symbol {
        query.symbol = s.to_uppercase();
    }
    if let Some(i) = interval {
        query.interval = i.parse::<Interval>()?;
    }

    super::runtime()?.block_on(async {
        let source = super::indicator_source(&config)?;
        let snapshot = source
            .snapshot(&query)
            .await
            .with_context(|| format!("Failed to fetch indicators for {}", query.ticker()))?;

        println!("{} ({})", query.ticker(), query.interval);
        for (key, value) in snapshot.iter() {
            println!("  {:<20} {}", key, value);
        }
        Ok(())
    })
}

pub fn recommend(config: AppConfig, coins: String, email: bool) -> Result<()> {
    let base = IndicatorQuery::from_config(&config.bot)?;
    let coins = split_list(&coins);

    super::runtime()?.block_on(async {
        let source = super::indicator_source(&config)?;
        let mut messages = Vec::new();

        for coin in &coins {
            let query = IndicatorQuery {
                symbol: format!("{}{}", coin, config.bot.coin_2),
                ..base.clone()
            };
            let rsi = match source.snapshot(&query).await.and_then(|s| s.rsi()) {
                Ok(rsi) => rsi,
                Err(e) => {
                    warn!("Skipping {}: {}", coin, e);
                    continue;
                }
            };
            info!("{} RSI: {:.2}", query.symbol, rsi);
            if let Some(rec) = Recommendation::from_rsi(rsi) {
                let message = rec.message(coin);
                println!("{}", message);
                messages.push(message);
            }
        }

        if messages.is_empty() {
            println!("No coin is in a BUY or SELL zone");
        } else if email {
            super::notifier(&config)
                .notify("RSI recommendations", &messages.join("\n"))
                .await?;
        }
        Ok(())
    })
}

pub fn price_alert(config: AppConfig, market: String, threshold: f64, email: bool) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::public_client(&config)?;
        let ticker = client.get_ticker(&market).await?;
        let last_price = ticker
            .last_price_f64()
            .with_context(|| format!("{} has no last price", market))?;

        match alert_text(&market, last_price, threshold) {
            Some(message) => {
                println!("{}", message);
                if email {
                    super::notifier(&config)
                        .notify(&format!("Price alert: {}", market), &message)
                        .await?;
                }
            }
            None => println!("{} trading at {}", market, last_price),
        }
        Ok(())
    })
}

pub fn snapshot(config: AppConfig, exclude: Option<String>) -> Result<()> {
    let extra = exclude.as_deref().map(split_list).unwrap_or_default();

    super::runtime()?.block_on(async {
        let client = super::public_client(&config)?;
        let tickers = client.get_all_tickers().await?;
        let rows = market_rows(&tickers, &extra);
        let path = write_snapshot(&config.paths.market_data_dir, Utc::now().date_naive(), &rows)?;
        println!("Saved {} markets to {}", rows.len(), path.display());
        Ok(())
    })
}

pub fn scan(config: AppConfig, below: f64, exclude: String, fallback_exchange: String) -> Result<()> {
    let base = IndicatorQuery::from_config(&config.bot)?;
    let exclude = split_list(&exclude);
    let fallback = Some(fallback_exchange.as_str()).filter(|e| !e.trim().is_empty());

    super::runtime()?.block_on(async {
        let client = super::public_client(&config)?;
        let markets: Vec<String> = market_rows(&client.get_all_tickers().await?, &exclude)
            .into_iter()
            .map(|row| row.market)
            .collect();
        info!("Scanning {} markets for RSI below {}", markets.len(), below);

        let source = super::indicator_source(&config)?;
        let hits = scan_markets(&source, &markets, &base, below, fallback).await;
        if hits.is_empty() {
            println!("No market has RSI below {}", below);
        }
        for hit in &hits {
            println!("{:<14} {:>8.2}", hit.symbol, hit.rsi);
        }
        Ok(())
    })
}

pub fn week_change(config: AppConfig, since: String) -> Result<()> {
    let initial_date = NaiveDate::parse_from_str(&since, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", since))?;
    let today = Utc::now().date_naive();
    let dir = &config.paths.market_data_dir;

    let initial_path = find_snapshot(dir, initial_date)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .with_context(|| format!("No snapshot for {} in {}", initial_date, dir.display()))?;
    let initial = read_snapshot(&initial_path)?;

    let latest = match find_snapshot(dir, today)? {
        Some(path) => read_snapshot(&path)?,
        None => {
            info!("No snapshot for {}, fetching tickers", today);
            super::runtime()?.block_on(async {
                let client = super::public_client(&config)?;
                let rows = market_rows(&client.get_all_tickers().await?, &[]);
                write_snapshot(dir, today, &rows)?;
                anyhow::Ok(rows)
            })?
        }
    };

    let week = week_number(initial_date, today);
    let changes = compute_week_change(&initial, &latest);
    let path = write_week_change(dir, week, &changes)?;

    let mut ranked: Vec<_> = changes.iter().collect();
    ranked.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
    println!("Week {} change since {} ({} markets)", week, initial_date, changes.len());
    for c in ranked.iter().take(10) {
        println!(
            "  {:<14} {:>14} -> {:<14} {:>8} %",
            c.market, c.initial_price, c.current_price, c.change_percent
        );
    }
    println!("Saved to {}", path.display());
    Ok(())
}
