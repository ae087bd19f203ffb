//! Pivot-band trading rules
//!
//! Pure functions over prices, pivots and RSI. The loop in [`crate::bot`]
//! feeds them live data and acts on the result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BotConfig;
use crate::indicators::FibonacciPivots;

/// Offset keeping the initial stop just under S1
pub const INITIAL_STOP_OFFSET: f64 = 0.000_000_01;

/// Buy, sell and stop-loss prices the loop trades against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub buy: f64,
    pub sell: f64,
    pub stop_loss: f64,
}

impl PriceLevels {
    /// Levels before any band has matched: buy at the pivot, sell at R1
    pub fn initial(pivots: &FibonacciPivots) -> Self {
        PriceLevels {
            buy: pivots.pivot,
            sell: pivots.r1,
            stop_loss: pivots.s1 - INITIAL_STOP_OFFSET,
        }
    }

    fn band(buy: f64, sell: f64) -> Self {
        PriceLevels {
            buy,
            sell,
            stop_loss: stop_loss_for(buy),
        }
    }

    /// Support band holding `price`, if any
    ///
    /// A band only matches while price trades below the candle close. Price
    /// under S3 matches nothing.
    pub fn select_band(price: f64, close: f64, pivots: &FibonacciPivots) -> Option<Self> {
        if price >= close {
            return None;
        }
        let p = pivots;
        if p.s1 < price && price < p.pivot {
            Some(Self::band(p.s1, p.pivot))
        } else if p.s2 < price && price < p.s1 {
            Some(Self::band(p.s2, p.s1))
        } else if p.s3 < price && price < p.s2 {
            Some(Self::band(p.s3, p.s2))
        } else {
            None
        }
    }

    /// Move to the band holding `price`; keep the current levels otherwise
    pub fn update(&mut self, price: f64, close: f64, pivots: &FibonacciPivots) -> bool {
        match Self::select_band(price, close, pivots) {
            Some(levels) => {
                *self = levels;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for PriceLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buy={} sell={} stop_loss={}",
            self.buy, self.sell, self.stop_loss
        )
    }
}

/// Stop loss one percent under `buy`, with the percentage truncated toward zero
pub fn stop_loss_for(buy: f64) -> f64 {
    buy - (0.01 * buy).trunc()
}

/// Percentage gain of selling at `sell` after buying at `buy`
pub fn profit_percent(buy: f64, sell: f64) -> f64 {
    if buy == 0.0 {
        return 0.0;
    }
    (sell - buy) / buy * 100.0
}

/// Order the loop placed in one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
}

/// Entry and exit thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRules {
    pub rsi_buy_below: f64,
    pub rsi_sell_above: f64,
    pub order_fraction: f64,
    pub min_order_value: f64,
}

impl Default for TradeRules {
    fn default() -> Self {
        TradeRules::from(&BotConfig::default())
    }
}

impl From<&BotConfig> for TradeRules {
    fn from(config: &BotConfig) -> Self {
        TradeRules {
            rsi_buy_below: config.rsi_buy_below,
            rsi_sell_above: config.rsi_sell_above,
            order_fraction: config.order_fraction,
            min_order_value: config.min_order_value,
        }
    }
}

impl TradeRules {
    /// Quote-currency amount committed to one buy
    pub fn order_size(&self, quote_balance: f64) -> f64 {
        self.order_fraction * quote_balance
    }

    /// Entry check: flat, enough to spend, and price on the buy level or RSI low
    ///
    /// Price triggers compare for exact equality with the levels.
    #[allow(clippy::float_cmp)]
    pub fn should_buy(
        &self,
        open_position: bool,
        price: f64,
        rsi: f64,
        order_size: f64,
        levels: &PriceLevels,
    ) -> bool {
        !open_position
            && order_size > self.min_order_value
            && (price == levels.buy || rsi < self.rsi_buy_below)
    }

    /// Exit check, evaluated after the entry check of the same iteration
    ///
    /// The sell level and RSI exits need an open position; a price touching
    /// the stop loss sells either way.
    #[allow(clippy::float_cmp)]
    pub fn should_sell(&self, open_position: bool, price: f64, rsi: f64, levels: &PriceLevels) -> bool {
        (open_position && price == levels.sell)
            || price == levels.stop_loss
            || (open_position && rsi > self.rsi_sell_above)
    }
}

/// RSI zone used by the recommendation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    StrongSell,
    Buy,
}

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

impl Recommendation {
    pub fn from_rsi(rsi: f64) -> Option<Self> {
        if rsi > RSI_OVERBOUGHT {
            Some(Recommendation::StrongSell)
        } else if rsi < RSI_OVERSOLD {
            Some(Recommendation::Buy)
        } else {
            None
        }
    }

    pub fn message(&self, coin: &str) -> String {
        match self {
            Recommendation::StrongSell => format!(
                "The RSI value of {} is over 70 and hence is in a strong SELL zone.",
                coin
            ),
            Recommendation::Buy => format!(
                "The RSI value of {} is less than 30 and hence is in a BUY zone.",
                coin
            ),
        }
    }
}

/// Alert text when `last_price` exceeds a non-zero `threshold`
pub fn price_alert(market: &str, last_price: f64, threshold: f64) -> Option<String> {
    if threshold != 0.0 && last_price > threshold {
        Some(format!(
            "Price of {} is more than {} trading at {}",
            market, threshold, last_price
        ))
    } else {
        None
    }
}
