//! Technical indicators powered by the `ta` crate
//!
//! Series functions return one `Option` per input value, `None` during the
//! warm-up period. They back the locally computed indicator source; the
//! TradingView source reports the same quantities precomputed.

use serde::{Deserialize, Serialize};
use ta::indicators::{
    ExponentialMovingAverage, FastStochastic, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::{Close, High, Low, Next};

use crate::coindcx::Candle;

/// Type alias for two-line indicators (line1, line2)
pub type DualLineOutput = (Vec<Option<f64>>, Vec<Option<f64>>);

impl High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let v = indicator.next(value);
            (i + 1 >= period).then_some(v)
        })
        .collect()
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let ema_val = indicator.next(value);
        if i + 1 >= period {
            result.push(Some(ema_val));
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate Relative Strength Index
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());

    // RSI needs `period` price changes, i.e. period + 1 closes
    for (i, &value) in values.iter().enumerate() {
        let rsi_val = indicator.next(value);
        if i >= period {
            result.push(Some(rsi_val));
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate MACD line and signal line
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> DualLineOutput {
    if values.is_empty() {
        return (vec![], vec![]);
    }

    let mut indicator =
        match MovingAverageConvergenceDivergence::new(fast_period, slow_period, signal_period) {
            Ok(i) => i,
            Err(_) => return (vec![None; values.len()], vec![None; values.len()]),
        };

    let warmup = slow_period;
    let mut macd_line = Vec::with_capacity(values.len());
    let mut signal_line = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let out = indicator.next(value);
        if i + 1 >= warmup {
            macd_line.push(Some(out.macd));
            signal_line.push(Some(out.signal));
        } else {
            macd_line.push(None);
            signal_line.push(None);
        }
    }

    (macd_line, signal_line)
}

/// Slow stochastic oscillator (%K smoothed by `smooth`, %D as SMA of %K)
///
/// With `(14, 3, 3)` this matches the `Stoch.K`/`Stoch.D` pair charting
/// platforms report.
pub fn stochastic(candles: &[Candle], k_period: usize, smooth: usize, d_period: usize) -> DualLineOutput {
    if candles.is_empty() {
        return (vec![], vec![]);
    }

    let mut fast = match FastStochastic::new(k_period) {
        Ok(i) => i,
        Err(_) => return (vec![None; candles.len()], vec![None; candles.len()]),
    };

    let raw_k: Vec<f64> = candles
        .iter()
        .map(|c| fast.next(c))
        .skip(k_period.saturating_sub(1))
        .collect();

    let slow_k: Vec<f64> = sma(&raw_k, smooth).into_iter().flatten().collect();
    let d: Vec<f64> = sma(&slow_k, d_period).into_iter().flatten().collect();

    (pad_front(slow_k, candles.len()), pad_front(d, candles.len()))
}

fn pad_front(values: Vec<f64>, len: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; len.saturating_sub(values.len())];
    out.extend(values.into_iter().map(Some));
    out
}

/// Latest defined value of a series
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

/// Fibonacci pivot levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciPivots {
    pub s3: f64,
    pub s2: f64,
    pub s1: f64,
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
}

impl FibonacciPivots {
    /// Pivots from the previous period's high, low and close
    pub fn from_hlc(high: f64, low: f64, close: f64) -> Self {
        let pivot = (high + low + close) / 3.0;
        let range = high - low;
        Self {
            s3: pivot - range,
            s2: pivot - 0.618 * range,
            s1: pivot - 0.382 * range,
            pivot,
            r1: pivot + 0.382 * range,
            r2: pivot + 0.618 * range,
            r3: pivot + range,
        }
    }

    /// Pivots over a run of candles: highest high, lowest low, last close
    pub fn from_candles(candles: &[Candle]) -> Option<Self> {
        let last = candles.last()?;
        let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        Some(Self::from_hlc(high, low, last.close))
    }
}
