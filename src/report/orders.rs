//! Append-only CSV log of placed orders

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::coindcx::OrderRequest;
use crate::error::Result;

const HEADER: [&str; 6] = ["datetime", "side", "order_type", "market", "price", "quantity"];

/// One line of the order history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHistoryRow {
    pub datetime: String,
    pub side: String,
    pub order_type: String,
    pub market: String,
    pub price: Option<f64>,
    pub quantity: f64,
}

impl From<&OrderRequest> for OrderHistoryRow {
    fn from(order: &OrderRequest) -> Self {
        let datetime = Utc
            .timestamp_millis_opt(order.timestamp)
            .single()
            .unwrap_or_else(Utc::now);
        OrderHistoryRow {
            datetime: datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            side: order.side.to_string(),
            order_type: order.order_type.to_string(),
            market: order.market.clone(),
            price: order.price_per_unit,
            quantity: order.total_quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderHistory {
    path: PathBuf,
}

impl OrderHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `order`, writing the header first when the file is new
    pub fn record(&self, order: &OrderRequest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            wtr.write_record(HEADER)?;
        }
        wtr.serialize(OrderHistoryRow::from(order))?;
        wtr.flush()?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<OrderHistoryRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}
