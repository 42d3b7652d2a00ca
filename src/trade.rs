// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
//! Trade records, floor price estimates and collection identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FloorPriceError, Result};

/// Identifies one asset collection. Each collection owns its own predictor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(String);

impl CollectionId {
    /// Wraps an identifier such as `"1:0xbc4c...f13d"`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One executed trade.
///
/// Timestamps are milliseconds since the Unix epoch.
///
/// # Example
/// ```rust
/// use floorprice::trade::Trade;
///
/// let trade = Trade::new(1.25, 1_700_000_000_000).unwrap();
/// assert_eq!(trade.price(), 1.25);
/// assert!(Trade::new(0.0, 1_700_000_000_000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    price: f64,
    timestamp_ms: u64,
}

impl Trade {
    /// Creates a trade record.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::InvalidTrade`] unless `price` is finite
    /// and strictly positive.
    pub fn new(price: f64, timestamp_ms: u64) -> Result<Self> {
        if !price.is_finite() || price <= 0.0 {
            return Err(FloorPriceError::InvalidTrade(format!(
                "price must be finite and positive, got {price}"
            )));
        }

        Ok(Self {
            price,
            timestamp_ms,
        })
    }

    /// Returns the sale price.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Returns the sale time in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

/// A published floor price, stamped with the cycle time that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Cycle time; only trades strictly before it were used.
    pub timestamp_ms: u64,
    /// Price level below which roughly `target_pct` of trades should fall.
    pub floor_price: f64,
    /// Percentile parameter used for this estimate.
    pub z: f64,
    /// Trades left after outlier filtering.
    pub sample_size: usize,
}
