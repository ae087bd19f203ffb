//! Trading loop
//!
//! Polls indicators, ticker and balance, moves the price levels with the
//! pivot bands and places limit orders when [`TradeRules`] says so. State
//! lives for one run only.

use async_trait::async_trait;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::coindcx::{CoinDCXClient, OrderRequest, OrderSide, OrdersResponse};
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::indicator::{IndicatorQuery, IndicatorSnapshot, IndicatorSource};
use crate::indicators::FibonacciPivots;
use crate::notify::Notifier;
use crate::strategy::{profit_percent, Action, PriceLevels, TradeRules};

/// Exchange operations the loop needs
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Last traded price of `market`
    async fn last_price(&self, market: &str) -> Result<f64>;

    /// Available balance of `currency`
    async fn balance(&self, currency: &str) -> Result<f64>;

    async fn place_limit_order(
        &self,
        side: OrderSide,
        market: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrdersResponse>;
}

#[async_trait]
impl ExchangeApi for CoinDCXClient {
    async fn last_price(&self, market: &str) -> Result<f64> {
        let ticker = self.get_ticker(market).await?;
        ticker
            .last_price_f64()
            .ok_or_else(|| BotError::TickerNotFound(format!("{} has no last price", market)))
    }

    async fn balance(&self, currency: &str) -> Result<f64> {
        self.get_balance(currency).await
    }

    async fn place_limit_order(
        &self,
        side: OrderSide,
        market: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrdersResponse> {
        self.place_order(&OrderRequest::limit(side, market, quantity, price))
            .await
    }
}

/// Loop state carried between iterations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotState {
    pub open_position: bool,
    pub no_of_trades: u32,
    pub levels: Option<PriceLevels>,
    /// Base-currency quantity bought by the open position
    pub position_quantity: f64,
    /// Price the open position was bought at
    pub entry_price: f64,
}

/// Everything one iteration reads from the outside world
#[derive(Debug, Clone)]
pub struct MarketData {
    pub price: f64,
    pub close: f64,
    pub rsi: f64,
    pub pivots: FibonacciPivots,
    pub quote_balance: f64,
}

impl MarketData {
    fn from_snapshot(snapshot: &IndicatorSnapshot, price: f64, quote_balance: f64) -> Result<Self> {
        Ok(Self {
            price,
            close: snapshot.close()?,
            rsi: snapshot.rsi()?,
            pivots: snapshot.pivots()?,
            quote_balance,
        })
    }
}

pub struct TradingBot<E, I, N> {
    exchange: E,
    indicators: I,
    notifier: N,
    config: BotConfig,
    rules: TradeRules,
    query: IndicatorQuery,
    symbol: String,
    state: BotState,
}

impl<E, I, N> TradingBot<E, I, N>
where
    E: ExchangeApi,
    I: IndicatorSource,
    N: Notifier,
{
    pub fn new(exchange: E, indicators: I, notifier: N, config: BotConfig) -> Result<Self> {
        let query = IndicatorQuery::from_config(&config)?;
        Ok(Self {
            exchange,
            indicators,
            notifier,
            rules: TradeRules::from(&config),
            symbol: config.symbol(),
            query,
            config,
            state: BotState::default(),
        })
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Fetch one snapshot and set the starting levels
    pub async fn initialise(&mut self) -> Result<PriceLevels> {
        let snapshot = match self.indicators.snapshot(&self.query).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to fetch initial indicators: {}", e);
                sleep(self.config.retry_delay()).await;
                self.indicators.snapshot(&self.query).await?
            }
        };
        let levels = PriceLevels::initial(&snapshot.pivots()?);
        info!("Initial levels for {}: {}", self.symbol, levels);
        self.state.levels = Some(levels);
        Ok(levels)
    }

    async fn fetch(&self) -> Result<MarketData> {
        let snapshot = self.indicators.snapshot(&self.query).await?;
        let price = self.exchange.last_price(&self.symbol).await?;
        let quote_balance = self.exchange.balance(&self.config.coin_2).await?;
        MarketData::from_snapshot(&snapshot, price, quote_balance)
    }

    /// Fetch, and after a failure wait `retry_delay` and try exactly once more
    async fn fetch_with_retry(&self) -> Option<MarketData> {
        match self.fetch().await {
            Ok(data) => return Some(data),
            Err(e) => {
                error!("Failed to fetch market data: {}", e);
                sleep(self.config.retry_delay()).await;
            }
        }
        match self.fetch().await {
            Ok(data) => Some(data),
            Err(e) => {
                error!("Retry failed, skipping iteration: {}", e);
                None
            }
        }
    }

    /// Run one iteration; `None` when market data could not be fetched
    ///
    /// The entry check runs first and a filled buy updates the state before
    /// the exit check, so one iteration can both buy and sell. Returns the
    /// orders placed, in order.
    pub async fn run_cycle(&mut self) -> Option<Vec<Action>> {
        let data = self.fetch_with_retry().await?;

        let levels = self
            .state
            .levels
            .get_or_insert_with(|| PriceLevels::initial(&data.pivots));
        if levels.update(data.price, data.close, &data.pivots) {
            debug!("Levels moved: {}", levels);
        }
        let levels = *levels;

        let order_size = self.rules.order_size(data.quote_balance);
        debug!(
            "price={} rsi={:.2} balance={} levels=[{}]",
            data.price, data.rsi, data.quote_balance, levels
        );

        let mut placed = Vec::new();
        if self.rules.should_buy(
            self.state.open_position,
            data.price,
            data.rsi,
            order_size,
            &levels,
        ) && self.buy(&levels, order_size).await
        {
            placed.push(Action::Buy);
        }
        if self
            .rules
            .should_sell(self.state.open_position, data.price, data.rsi, &levels)
            && self.sell(&levels, order_size).await
        {
            placed.push(Action::Sell);
        }
        Some(placed)
    }

    async fn buy(&mut self, levels: &PriceLevels, order_size: f64) -> bool {
        let quantity = order_size / levels.buy;
        match self
            .exchange
            .place_limit_order(OrderSide::Buy, &self.symbol, levels.buy, quantity)
            .await
        {
            Ok(_) => {
                info!(
                    "Buy order placed: {} {} at {}",
                    quantity, self.config.coin_1, levels.buy
                );
                self.state.open_position = true;
                self.state.position_quantity = quantity;
                self.state.entry_price = levels.buy;
                true
            }
            Err(e) => {
                error!("Failed to place buy order: {}", e);
                false
            }
        }
    }

    /// Sell the open position, or `order_size` worth at the sell level when
    /// a stop-loss touch fires without one
    async fn sell(&mut self, levels: &PriceLevels, order_size: f64) -> bool {
        let (quantity, entry_price) = if self.state.open_position {
            (self.state.position_quantity, self.state.entry_price)
        } else {
            (order_size / levels.sell, levels.buy)
        };
        match self
            .exchange
            .place_limit_order(OrderSide::Sell, &self.symbol, levels.sell, quantity)
            .await
        {
            Ok(_) => {
                let profit = profit_percent(entry_price, levels.sell);
                self.state.open_position = false;
                self.state.position_quantity = 0.0;
                self.state.no_of_trades += 1;
                let message = format!(
                    "Sold {} {} at {} (bought at {}), profit {:.2}%. Trades so far: {}",
                    quantity,
                    self.config.coin_1,
                    levels.sell,
                    entry_price,
                    profit,
                    self.state.no_of_trades
                );
                info!("{}", message);
                if let Err(e) = self
                    .notifier
                    .notify(&format!("{} trade closed", self.symbol), &message)
                    .await
                {
                    warn!("Failed to send notification: {}", e);
                }
                true
            }
            Err(e) => {
                error!("Failed to place sell order: {}", e);
                false
            }
        }
    }

    /// Run until the trade cap is reached or Ctrl+C is pressed
    pub async fn run(&mut self) -> Result<BotState> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until the trade cap is reached or `shutdown` completes
    ///
    /// `shutdown` is only observed between iterations, never while an
    /// order is in flight.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<BotState>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.initialise().await?;
        info!(
            "Trading {} (max {} trades, polling every {:?})",
            self.symbol,
            self.config.max_trades,
            self.config.poll_interval()
        );

        while self.state.no_of_trades < self.config.max_trades {
            self.run_cycle().await;

            if self.state.no_of_trades >= self.config.max_trades {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Shutdown requested, stopping trading loop");
                    break;
                }
                _ = sleep(self.config.poll_interval()) => {}
            }
        }

        info!(
            "Trading loop finished after {} trades (position open: {})",
            self.state.no_of_trades, self.state.open_position
        );
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{CLOSE, RSI};
    use crate::notify::LogNotifier;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeExchange {
        prices: Mutex<VecDeque<f64>>,
        last: Mutex<f64>,
        balance: f64,
        orders: Mutex<Vec<(OrderSide, f64, f64)>>,
    }

    impl FakeExchange {
        fn new(prices: &[f64], balance: f64) -> Self {
            Self {
                prices: Mutex::new(prices.iter().copied().collect()),
                last: Mutex::new(prices[0]),
                balance,
                orders: Mutex::new(Vec::new()),
            }
        }

        fn orders(&self) -> Vec<(OrderSide, f64, f64)> {
            self.orders.lock().unwrap().clone()
        }

        fn count(&self, side: OrderSide) -> usize {
            self.orders().iter().filter(|(s, _, _)| *s == side).count()
        }
    }

    #[async_trait]
    impl ExchangeApi for FakeExchange {
        async fn last_price(&self, _market: &str) -> Result<f64> {
            let mut last = self.last.lock().unwrap();
            if let Some(p) = self.prices.lock().unwrap().pop_front() {
                *last = p;
            }
            Ok(*last)
        }

        async fn balance(&self, _currency: &str) -> Result<f64> {
            Ok(self.balance)
        }

        async fn place_limit_order(
            &self,
            side: OrderSide,
            _market: &str,
            price: f64,
            quantity: f64,
        ) -> Result<OrdersResponse> {
            self.orders.lock().unwrap().push((side, price, quantity));
            Ok(OrdersResponse::default())
        }
    }

    /// Serves a fixed snapshot after failing the first `failures` calls
    struct FakeIndicators {
        snapshot: IndicatorSnapshot,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FakeIndicators {
        fn new(rsi: f64) -> Self {
            let mut snapshot = IndicatorSnapshot::new().with(RSI, rsi).with(CLOSE, 101.0);
            snapshot.set_pivots(&pivots());
            Self {
                snapshot,
                failures: 0,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, failures: usize) -> Self {
            self.failures = failures;
            self
        }
    }

    #[async_trait]
    impl IndicatorSource for FakeIndicators {
        async fn snapshot(&self, query: &IndicatorQuery) -> Result<IndicatorSnapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(BotError::IndicatorUnavailable(query.ticker()));
            }
            Ok(self.snapshot.clone())
        }
    }

    fn pivots() -> FibonacciPivots {
        FibonacciPivots {
            s3: 80.0,
            s2: 87.0,
            s1: 93.0,
            pivot: 100.0,
            r1: 107.0,
            r2: 113.0,
            r3: 120.0,
        }
    }

    fn config(max_trades: u32) -> BotConfig {
        BotConfig {
            max_trades,
            retry_delay_secs: 0,
            poll_interval_secs: 0,
            ..BotConfig::default()
        }
    }

    fn bot(
        prices: &[f64],
        indicators: FakeIndicators,
        max_trades: u32,
    ) -> TradingBot<FakeExchange, FakeIndicators, LogNotifier> {
        TradingBot::new(
            FakeExchange::new(prices, 100.0),
            indicators,
            LogNotifier,
            config(max_trades),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_initial_levels() {
        let mut bot = bot(&[95.0], FakeIndicators::new(50.0), 100);
        let levels = bot.initialise().await.unwrap();
        assert_eq!(levels.buy, 100.0);
        assert_eq!(levels.sell, 107.0);
        assert!(levels.stop_loss < 93.0);
    }

    #[tokio::test]
    async fn test_low_rsi_below_support_buys() {
        let mut bot = bot(&[90.0], FakeIndicators::new(30.0), 100);
        bot.initialise().await.unwrap();

        assert_eq!(bot.run_cycle().await, Some(vec![Action::Buy]));

        let orders = bot.exchange().orders();
        assert_eq!(orders.len(), 1);
        let (side, price, quantity) = orders[0];
        assert_eq!(side, OrderSide::Buy);
        assert_eq!(price, 87.0);
        assert!((quantity - 33.0 / 87.0).abs() < 1e-9);

        let state = bot.state();
        assert!(state.open_position);
        assert!(state.no_of_trades <= 100);
        assert_eq!(state.levels.unwrap().sell, 93.0);
    }

    #[tokio::test]
    async fn test_no_second_buy_while_open() {
        let mut bot = bot(&[90.0, 90.5], FakeIndicators::new(30.0), 100);
        bot.initialise().await.unwrap();

        assert_eq!(bot.run_cycle().await, Some(vec![Action::Buy]));
        assert_eq!(bot.run_cycle().await, Some(vec![]));
        assert_eq!(bot.exchange().count(OrderSide::Buy), 1);
    }

    #[tokio::test]
    async fn test_price_at_sell_level_sells_once() {
        let mut bot = bot(&[90.0, 93.0, 93.0], FakeIndicators::new(45.0), 100);
        bot.initialise().await.unwrap();

        // price inside the S2-S1 band at RSI 45: levels move, nothing fires
        assert_eq!(bot.run_cycle().await, Some(vec![]));
        bot.state.open_position = true;
        bot.state.position_quantity = 0.5;
        bot.state.entry_price = 87.0;

        assert_eq!(bot.run_cycle().await, Some(vec![Action::Sell]));
        assert_eq!(bot.run_cycle().await, Some(vec![]));

        let sells: Vec<_> = bot
            .exchange()
            .orders()
            .into_iter()
            .filter(|(s, _, _)| *s == OrderSide::Sell)
            .collect();
        assert_eq!(sells, vec![(OrderSide::Sell, 93.0, 0.5)]);
        assert_eq!(bot.state().no_of_trades, 1);
        assert!(!bot.state().open_position);
    }

    #[tokio::test]
    async fn test_buy_and_stop_loss_sell_in_one_cycle() {
        let mut bot = bot(&[95.0, 93.0], FakeIndicators::new(45.0), 100);
        bot.initialise().await.unwrap();

        // S1-pivot band: buy 93, sell 100, stop loss 93
        assert_eq!(bot.run_cycle().await, Some(vec![]));
        let levels = bot.state().levels.unwrap();
        assert_eq!((levels.buy, levels.sell, levels.stop_loss), (93.0, 100.0, 93.0));

        assert_eq!(
            bot.run_cycle().await,
            Some(vec![Action::Buy, Action::Sell])
        );
        let orders = bot.exchange().orders();
        assert_eq!(orders.len(), 2);
        assert_eq!((orders[0].0, orders[0].1), (OrderSide::Buy, 93.0));
        assert_eq!((orders[1].0, orders[1].1), (OrderSide::Sell, 100.0));
        assert!((orders[0].2 - 33.0 / 93.0).abs() < 1e-9);
        assert_eq!(orders[1].2, orders[0].2);

        let state = bot.state();
        assert_eq!(state.no_of_trades, 1);
        assert!(!state.open_position);
    }

    #[tokio::test]
    async fn test_stop_loss_sells_without_open_position() {
        let mut bot = bot(&[105.0], FakeIndicators::new(45.0), 100);
        bot.state.levels = Some(PriceLevels {
            buy: 110.0,
            sell: 120.0,
            stop_loss: 105.0,
        });

        assert_eq!(bot.run_cycle().await, Some(vec![Action::Sell]));
        let orders = bot.exchange().orders();
        assert_eq!(orders.len(), 1);
        let (side, price, quantity) = orders[0];
        assert_eq!((side, price), (OrderSide::Sell, 120.0));
        assert!((quantity - 33.0 / 120.0).abs() < 1e-9);
        assert_eq!(bot.state().no_of_trades, 1);
        assert!(!bot.state().open_position);
    }

    #[tokio::test]
    async fn test_price_below_s3_keeps_levels() {
        let mut bot = bot(&[75.0], FakeIndicators::new(45.0), 100);
        let initial = bot.initialise().await.unwrap();
        bot.run_cycle().await;
        assert_eq!(bot.state().levels, Some(initial));
    }

    #[tokio::test]
    async fn test_fetch_retries_once_then_skips() {
        let mut bot = bot(&[90.0], FakeIndicators::new(30.0).failing(3), 100);
        bot.state.levels = Some(PriceLevels::initial(&pivots()));

        // first attempt and its retry both fail
        assert_eq!(bot.run_cycle().await, None);
        assert!(bot.exchange().orders().is_empty());

        // third call fails, the retry succeeds
        assert_eq!(bot.run_cycle().await, Some(vec![Action::Buy]));
        assert_eq!(bot.indicators.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_run_stops_at_trade_cap() {
        // alternate between the S2-S1 band and the S1 sell level
        let prices: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 90.0 } else { 93.0 }).collect();
        let mut bot = bot(&prices, FakeIndicators::new(30.0), 3);

        let state = bot.run_until(std::future::pending()).await.unwrap();

        assert_eq!(state.no_of_trades, 3);
        assert!(!state.open_position);
        assert_eq!(bot.exchange().count(OrderSide::Buy), 3);
        assert_eq!(bot.exchange().count(OrderSide::Sell), 3);
    }

    #[tokio::test]
    async fn test_run_honours_shutdown() {
        let mut bot = bot(&[101.0], FakeIndicators::new(50.0), 100);
        let state = bot.run_until(async {}).await.unwrap();
        assert_eq!(state.no_of_trades, 0);
        assert!(bot.exchange().orders().is_empty());
    }
}
