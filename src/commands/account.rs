//! Account commands - balances, orders and fills of one CoinDCX account

use anyhow::Result;
use tracing::{info, warn};

use crypto_trading_bot::coindcx::{OrderRequest, OrderResponse, OrderSide};
use crypto_trading_bot::config::AppConfig;
use crypto_trading_bot::indicator::IndicatorQuery;
use crypto_trading_bot::report::balance_report;
use crypto_trading_bot::scan::{has_locked_funds, holdings_alerts};

fn print_orders(orders: &[OrderResponse]) {
    if orders.is_empty() {
        println!("No orders");
        return;
    }
    println!(
        "{:<38} {:<10} {:<5} {:<12} {:>14} {:>14} {:>14}",
        "ID", "MARKET", "SIDE", "STATUS", "PRICE", "QUANTITY", "REMAINING"
    );
    for o in orders {
        println!(
            "{:<38} {:<10} {:<5} {:<12} {:>14} {:>14} {:>14}",
            o.id,
            o.market.as_deref().unwrap_or("-"),
            o.side.as_deref().unwrap_or("-"),
            o.status,
            o.price_per_unit.map(|p| p.to_string()).unwrap_or_default(),
            o.total_quantity.map(|q| q.to_string()).unwrap_or_default(),
            o.remaining_quantity.map(|q| q.to_string()).unwrap_or_default(),
        );
    }
}

pub fn balances(config: AppConfig, account: Option<String>) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let balances = client.get_balances().await?;
        let tickers = client.get_all_tickers().await?;
        let rows = balance_report(&balances, &tickers);

        println!(
            "{:<10} {:>18} {:>18} {:>16}",
            "CURRENCY", "BALANCE", "LOCKED", "PRICE"
        );
        for row in &rows {
            println!(
                "{:<10} {:>18} {:>18} {:>16}",
                row.currency,
                row.balance,
                row.locked_balance,
                row.current_price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        info!("{} non-zero balances", rows.len());
        Ok(())
    })
}

pub fn order(
    config: AppConfig,
    account: Option<String>,
    side: OrderSide,
    market: String,
    quantity: f64,
    price: Option<f64>,
) -> Result<()> {
    if quantity <= 0.0 {
        anyhow::bail!("Quantity must be positive, got {}", quantity);
    }
    let request = match price {
        Some(p) => OrderRequest::limit(side, &market, quantity, p),
        None => OrderRequest::market(side, &market, quantity),
    };

    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let response = client.place_order(&request).await?;
        print_orders(&response.orders);
        Ok(())
    })
}

pub fn cancel(config: AppConfig, account: Option<String>, order_id: String) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let response = client.cancel_order(&order_id).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    })
}

pub fn cancel_all(
    config: AppConfig,
    account: Option<String>,
    market: String,
    side: Option<OrderSide>,
) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let response = client.cancel_all_orders(&market, side).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    })
}

pub fn edit_price(
    config: AppConfig,
    account: Option<String>,
    order_id: String,
    price: f64,
) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let response = client.edit_order_price(&order_id, price).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    })
}

pub fn active_orders(
    config: AppConfig,
    account: Option<String>,
    market: String,
    side: Option<OrderSide>,
) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let response = client.get_active_orders(&market, side).await?;
        print_orders(&response.orders);
        Ok(())
    })
}

pub fn trade_history(
    config: AppConfig,
    account: Option<String>,
    from_id: Option<i64>,
    limit: u32,
) -> Result<()> {
    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let trades = client.get_trade_history(from_id, limit).await?;

        println!(
            "{:<12} {:<10} {:<5} {:>14} {:>14} {:>12}",
            "ID", "SYMBOL", "SIDE", "PRICE", "QUANTITY", "FEE"
        );
        for t in &trades {
            println!(
                "{:<12} {:<10} {:<5} {:>14} {:>14} {:>12}",
                t.id, t.symbol, t.side, t.price, t.quantity, t.fee_amount
            );
        }
        Ok(())
    })
}

pub fn holdings_alert(config: AppConfig, account: Option<String>, above: f64) -> Result<()> {
    let base = IndicatorQuery::from_config(&config.bot)?;

    super::runtime()?.block_on(async {
        let client = super::exchange_client(&config, account.as_deref())?;
        let balances = client.get_balances().await?;
        if has_locked_funds(&balances) {
            warn!("Open orders hold part of the balance, skipping holdings alert");
            return Ok(());
        }

        let source = super::indicator_source(&config)?;
        let notifier = super::notifier(&config);
        let hits = holdings_alerts(
            &source,
            &notifier,
            &balances,
            &base,
            &config.bot.coin_2,
            above,
        )
        .await?;
        if hits.is_empty() {
            println!("No free holding has RSI above {}", above);
        }
        for hit in &hits {
            println!("{:<14} {:>8.2}", hit.symbol, hit.rsi);
        }
        Ok(())
    })
}
