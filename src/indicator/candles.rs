//! Indicator snapshots computed locally from exchange candles

use async_trait::async_trait;
use tracing::debug;

use super::*;
use crate::coindcx::{Candle, CoinDCXClient};
use crate::indicators::{ema, last_value, macd, rsi, stochastic, FibonacciPivots};

/// Builds snapshots from CoinDCX candles instead of asking a scanner
pub struct CandleIndicatorSource {
    client: CoinDCXClient,
    limit: u32,
}

impl CandleIndicatorSource {
    pub fn new(client: CoinDCXClient, limit: u32) -> Self {
        Self { client, limit }
    }
}

#[async_trait]
impl IndicatorSource for CandleIndicatorSource {
    async fn snapshot(&self, query: &IndicatorQuery) -> Result<IndicatorSnapshot> {
        let candles = self
            .client
            .get_candles_for_symbol(&query.symbol, query.interval.candle_interval(), self.limit)
            .await?;
        debug!("Computing indicators for {} from {} candles", query.symbol, candles.len());
        snapshot_from_candles(candles).map_err(|e| match e {
            BotError::IndicatorUnavailable(_) => BotError::IndicatorUnavailable(query.ticker()),
            other => other,
        })
    }
}

/// Compute a snapshot from candles in any order
///
/// Price fields come from the newest candle. Pivots use the completed
/// candles, i.e. every candle but the newest.
pub fn snapshot_from_candles(mut candles: Vec<Candle>) -> Result<IndicatorSnapshot> {
    if candles.len() < 2 {
        return Err(BotError::IndicatorUnavailable(format!(
            "{} candles",
            candles.len()
        )));
    }
    candles.sort_by_key(|c| c.time);

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let mut snapshot = IndicatorSnapshot::new();

    let mut put = |key: &str, value: Option<f64>| {
        if let Some(v) = value {
            snapshot.insert(key, v);
        }
    };

    put(RSI, last_value(&rsi(&closes, 14)));
    for (key, period) in [(EMA10, 10), (EMA20, 20), (EMA50, 50), (EMA100, 100), (EMA200, 200)] {
        put(key, last_value(&ema(&closes, period)));
    }

    let (macd_line, signal_line) = macd(&closes, 12, 26, 9);
    put(MACD, last_value(&macd_line));
    put(MACD_SIGNAL, last_value(&signal_line));

    let (k, d) = stochastic(&candles, 14, 3, 3);
    put(STOCH_K, last_value(&k));
    put(STOCH_D, last_value(&d));

    let (latest, completed) = candles
        .split_last()
        .ok_or_else(|| BotError::IndicatorUnavailable("no candles".to_string()))?;
    put(OPEN, Some(latest.open));
    put(HIGH, Some(latest.high));
    put(LOW, Some(latest.low));
    put(CLOSE, Some(latest.close));
    put(VOLUME, Some(latest.volume));

    if let Some(pivots) = FibonacciPivots::from_candles(completed) {
        snapshot.set_pivots(&pivots);
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(n: usize) -> Vec<Candle> {
        // newest first, as the exchange returns them
        (0..n)
            .rev()
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 10.0 + i as f64 * 0.1;
                Candle {
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0 + i as f64,
                    time: 1_700_000_000_000 + i as i64 * 60_000,
                }
            })
            .collect()
    }

    #[test]
    fn test_full_snapshot() {
        let input = candles(250);
        let newest_close = input[0].close;

        let snapshot = snapshot_from_candles(input).unwrap();
        assert_eq!(snapshot.len(), SNAPSHOT_FIELDS.len());
        assert_eq!(snapshot.close().unwrap(), newest_close);

        let rsi = snapshot.rsi().unwrap();
        assert!((0.0..=100.0).contains(&rsi));

        let pivots = snapshot.pivots().unwrap();
        assert!(pivots.s3 < pivots.s1 && pivots.s1 < pivots.pivot && pivots.pivot < pivots.r1);
    }

    #[test]
    fn test_pivots_exclude_latest_candle() {
        let mut input = candles(30);
        // a spike in the forming candle must not move the pivots
        input[0].high = 10_000.0;
        let spiked = snapshot_from_candles(input.clone()).unwrap();

        input[0].high = input[0].close + 1.0;
        let normal = snapshot_from_candles(input).unwrap();

        assert_eq!(spiked.pivots().unwrap(), normal.pivots().unwrap());
    }

    #[test]
    fn test_short_history_omits_long_averages() {
        let snapshot = snapshot_from_candles(candles(30)).unwrap();
        assert!(snapshot.get(EMA20).is_some());
        assert!(snapshot.get(EMA200).is_none());
        assert!(snapshot.get(RSI).is_some());
    }

    #[test]
    fn test_too_few_candles() {
        assert!(matches!(
            snapshot_from_candles(candles(1)),
            Err(BotError::IndicatorUnavailable(_))
        ));
    }
}
