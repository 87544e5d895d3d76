//! # Ticker Record
//!
//! The immutable unit of streaming market data that flows through the
//! recorder. A `Record` is produced by the (external) decoding layer, handed to
//! [`FeedRecorder::ingest`](crate::core::recorder::FeedRecorder::ingest), and from
//! then on only ever copied: once into History, once into the Pending Queue, and
//! by reference into a sink batch.
//!
//! Prices and quantities are `f64`. Single precision cannot hold 15-16
//! significant digits and silently corrupts quotes such as `0.000012345678`.

use std::mem;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column order of the tabular (CSV) representation.
pub const CSV_HEADER: [&str; 14] = [
    "timestamp",
    "pair",
    "type",
    "bid",
    "bid_qty",
    "ask",
    "ask_qty",
    "last",
    "volume",
    "vwap",
    "low",
    "high",
    "change",
    "change_pct",
];

/// Estimated in-memory footprint of one buffered record, used by the size trigger.
pub const RECORD_SIZE_BYTES: usize = mem::size_of::<Record>();

/// # Record
///
/// One decoded ticker update. Field order matches [`CSV_HEADER`]; serde renames
/// keep the wire/column names of the exchange feed (`pair`, `type`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Instant the update was observed (UTC).
    pub timestamp: DateTime<Utc>,
    /// Stream identity, e.g. `BTC/USD`.
    #[serde(rename = "pair")]
    pub symbol: String,
    /// Classification tag: `snapshot` or `update`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Best bid price.
    pub bid: f64,
    /// Quantity at best bid.
    pub bid_qty: f64,
    /// Best ask price.
    pub ask: f64,
    /// Quantity at best ask.
    pub ask_qty: f64,
    /// Last traded price.
    pub last: f64,
    /// Rolling 24h volume.
    pub volume: f64,
    /// Rolling 24h volume-weighted average price.
    pub vwap: f64,
    /// Rolling 24h low.
    pub low: f64,
    /// Rolling 24h high.
    pub high: f64,
    /// Absolute 24h change.
    pub change: f64,
    /// Relative 24h change in percent.
    pub change_pct: f64,
}

impl Record {
    /// Creates a record with the identity fields set and every numeric field zeroed.
    pub fn new(timestamp: DateTime<Utc>, symbol: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Sets the top-of-book fields.
    pub fn with_book(mut self, bid: f64, bid_qty: f64, ask: f64, ask_qty: f64) -> Self {
        self.bid = bid;
        self.bid_qty = bid_qty;
        self.ask = ask;
        self.ask_qty = ask_qty;
        self
    }

    /// Sets the last-trade and rolling statistics fields.
    #[allow(clippy::too_many_arguments)]
    pub fn with_stats(
        mut self,
        last: f64,
        volume: f64,
        vwap: f64,
        low: f64,
        high: f64,
        change: f64,
        change_pct: f64,
    ) -> Self {
        self.last = last;
        self.volume = volume;
        self.vwap = vwap;
        self.low = low;
        self.high = high;
        self.change = change;
        self.change_pct = change_pct;
        self
    }

    /// The stream identity this record belongs to.
    pub fn key(&self) -> &str {
        &self.symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_keeps_full_precision() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 12, 10, 0, 0).unwrap();
        let record = Record::new(ts, "SHIB/USD", "update")
            .with_book(0.000012345678901, 1_000_000.0, 0.000012345678911, 2_500_000.0);

        assert_eq!(record.key(), "SHIB/USD");
        assert_eq!(record.bid, 0.000012345678901);
        assert_ne!(record.bid as f32 as f64, record.bid);
    }

    #[test]
    fn test_record_size_covers_numeric_fields() {
        // Numeric columns are stored inline.
        assert!(RECORD_SIZE_BYTES >= 11 * mem::size_of::<f64>());
        assert_eq!(RECORD_SIZE_BYTES, mem::size_of::<Record>());
    }

    #[test]
    fn test_json_uses_feed_column_names() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 12, 10, 0, 0).unwrap();
        let record = Record::new(ts, "ETH/USD", "update");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["pair"], "ETH/USD");
        assert_eq!(json["type"], "update");
        assert!(json.get("symbol").is_none());
    }
}
