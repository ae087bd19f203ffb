//! RSI scans over many markets and over the coins an account holds

use tracing::{debug, info, warn};

use crate::coindcx::Balance;
use crate::error::Result;
use crate::indicator::{IndicatorQuery, IndicatorSource};
use crate::notify::Notifier;

/// Currencies the holdings alert never looks at
pub const IGNORED_HOLDINGS: [&str; 3] = ["NOAH", "XEC", "INR"];

/// Smallest free balance worth alerting on
pub const MIN_FREE_BALANCE: f64 = 1.0;

/// A symbol whose RSI crossed the scan threshold
#[derive(Debug, Clone, PartialEq)]
pub struct RsiHit {
    pub symbol: String,
    pub rsi: f64,
}

async fn rsi_of<S>(source: &S, query: &IndicatorQuery) -> Result<f64>
where
    S: IndicatorSource + ?Sized,
{
    source.snapshot(query).await?.rsi()
}

/// RSI of every market below `below`, in market order
///
/// A market the main exchange cannot serve is asked of `fallback_exchange`
/// once; markets failing both are logged and skipped.
pub async fn scan_markets<S>(
    source: &S,
    markets: &[String],
    base: &IndicatorQuery,
    below: f64,
    fallback_exchange: Option<&str>,
) -> Vec<RsiHit>
where
    S: IndicatorSource + ?Sized,
{
    let mut hits = Vec::new();
    for market in markets {
        let query = IndicatorQuery {
            symbol: market.clone(),
            ..base.clone()
        };
        let rsi = match rsi_of(source, &query).await {
            Ok(rsi) => rsi,
            Err(e) => {
                let Some(exchange) = fallback_exchange else {
                    warn!("Skipping {}: {}", query.ticker(), e);
                    continue;
                };
                debug!("{} failed ({}), trying {}", query.ticker(), e, exchange);
                let retry = IndicatorQuery {
                    exchange: exchange.to_string(),
                    ..query
                };
                match rsi_of(source, &retry).await {
                    Ok(rsi) => rsi,
                    Err(e) => {
                        warn!("Skipping {}: {}", retry.ticker(), e);
                        continue;
                    }
                }
            }
        };
        if rsi < below {
            info!("{} RSI {:.2}", market, rsi);
            hits.push(RsiHit {
                symbol: market.clone(),
                rsi,
            });
        }
    }
    hits
}

/// Whether any balance is tied up in an open order
pub fn has_locked_funds(balances: &[Balance]) -> bool {
    balances.iter().any(|b| b.locked_balance != 0.0)
}

/// Coins held outright: nothing locked and more than one unit free
pub fn free_holdings<'a>(balances: &'a [Balance], ignored: &[&str]) -> Vec<&'a Balance> {
    balances
        .iter()
        .filter(|b| !ignored.contains(&b.currency.as_str()))
        .filter(|b| b.locked_balance == 0.0 && b.balance > MIN_FREE_BALANCE)
        .collect()
}

/// Check each free holding against `quote` and alert when RSI is above `above`
///
/// Returns the holdings alerted on. Failing indicator lookups skip the coin;
/// a failing notifier stops the run.
pub async fn holdings_alerts<S, N>(
    source: &S,
    notifier: &N,
    balances: &[Balance],
    base: &IndicatorQuery,
    quote: &str,
    above: f64,
) -> Result<Vec<RsiHit>>
where
    S: IndicatorSource + ?Sized,
    N: Notifier + ?Sized,
{
    let mut hits = Vec::new();
    for holding in free_holdings(balances, &IGNORED_HOLDINGS) {
        info!("Holding {} {}", holding.balance, holding.currency);
        let query = IndicatorQuery {
            symbol: format!("{}{}", holding.currency, quote),
            ..base.clone()
        };
        let rsi = match rsi_of(source, &query).await {
            Ok(rsi) => rsi,
            Err(e) => {
                warn!("Skipping {}: {}", query.ticker(), e);
                continue;
            }
        };
        if rsi > above {
            info!("Selling {} (RSI {:.2})", holding.currency, rsi);
            notifier
                .notify(
                    &format!("Sold {}", holding.currency),
                    &format!(
                        "{} {} held with RSI {:.2} on {}",
                        holding.balance, holding.currency, rsi, query.symbol
                    ),
                )
                .await?;
            hits.push(RsiHit {
                symbol: query.symbol,
                rsi,
            });
        }
    }
    Ok(hits)
}
