//! Account balances priced against current tickers

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::coindcx::{Balance, Ticker};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRow {
    pub currency: String,
    pub balance: f64,
    pub locked_balance: f64,
    /// Last price of the currency's reference market, if listed
    pub current_price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Market a currency is priced in: USDT against INR, everything else against USDT
pub fn reference_market(currency: &str) -> String {
    if currency == "USDT" {
        "USDTINR".to_string()
    } else {
        format!("{}USDT", currency)
    }
}

/// Non-zero balances with their current prices
pub fn balance_report(balances: &[Balance], tickers: &[Ticker]) -> Vec<BalanceRow> {
    let prices: HashMap<&str, f64> = tickers
        .iter()
        .filter_map(|t| Some((t.market.as_str(), t.last_price_f64()?)))
        .collect();
    let now = Utc::now();

    balances
        .iter()
        .filter(|b| b.balance != 0.0 || b.locked_balance != 0.0)
        .map(|b| BalanceRow {
            currency: b.currency.clone(),
            balance: b.balance,
            locked_balance: b.locked_balance,
            current_price: prices.get(reference_market(&b.currency).as_str()).copied(),
            timestamp: now,
        })
        .collect()
}
