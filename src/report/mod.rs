//! CSV reports and account summaries

pub mod balances;
pub mod market;
pub mod orders;

pub use balances::{balance_report, BalanceRow};
pub use market::{market_rows, week_change, MarketRow, WeekChange};
pub use orders::{OrderHistory, OrderHistoryRow};
