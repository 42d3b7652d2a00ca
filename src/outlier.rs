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
//! Median-absolute-deviation outlier filter.
//!
//! A trade is kept when its (scaled) price lies within
//! `median ± mad_multiplier × MAD` of the window, bounds inclusive. Both
//! statistics are median based, so a handful of extreme prints cannot drag
//! the bounds toward themselves.
//!
//! The rule is applied repeatedly until a pass removes nothing, which makes
//! the filter idempotent: filtering its own output is a no-op.

use tracing::debug;

use crate::config::{OutlierConfig, PriceScale};
use crate::error::Result;
use crate::quantile::median_sorted;
use crate::trade::Trade;

/// Why the filter stopped removing trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// The last pass removed nothing.
    Converged,
    /// The window is smaller than the configured minimum. Either the input
    /// was returned as-is or a pass left fewer trades than the minimum.
    TooFewTrades,
    /// All remaining prices are identical (MAD is zero); returned as-is.
    ZeroDispersion,
}

/// Result of filtering one window.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredWindow {
    /// Surviving trades in their original order.
    pub trades: Vec<Trade>,
    /// Number of trades discarded.
    pub removed: usize,
    /// Number of passes that removed at least one trade.
    pub passes: usize,
    pub status: FilterStatus,
}

impl FilteredWindow {
    /// Returns the number of surviving trades.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Returns true if every trade was discarded.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

/// Order-preserving MAD filter over a window of trades.
///
/// # Example
/// ```rust
/// use floorprice::config::{OutlierConfig, PriceScale};
/// use floorprice::outlier::OutlierFilter;
/// use floorprice::trade::Trade;
///
/// let filter = OutlierFilter::new(&OutlierConfig::default(), PriceScale::Linear).unwrap();
/// let mut trades: Vec<Trade> = (0..20)
///     .map(|i| Trade::new(1.0 + i as f64 * 0.01, i).unwrap())
///     .collect();
/// trades.push(Trade::new(100.0, 20).unwrap());
///
/// let filtered = filter.filter(&trades);
/// assert_eq!(filtered.removed, 1);
/// assert!(filtered.trades.iter().all(|trade| trade.price() < 2.0));
/// ```
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    mad_multiplier: f64,
    min_trades: usize,
    scale: PriceScale,
}

impl OutlierFilter {
    /// Creates a filter working on `scale`.
    ///
    /// # Errors
    /// Returns [`crate::FloorPriceError::Configuration`] for a non-positive
    /// multiplier or a zero minimum.
    pub fn new(config: &OutlierConfig, scale: PriceScale) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            mad_multiplier: config.mad_multiplier,
            min_trades: config.min_filter_trades,
            scale,
        })
    }

    /// Returns the multiple of the MAD a trade may sit from the median.
    pub fn mad_multiplier(&self) -> f64 {
        self.mad_multiplier
    }

    /// Returns the smallest window the filter will touch.
    pub fn min_trades(&self) -> usize {
        self.min_trades
    }

    /// Removes outliers from `trades`, preserving order.
    pub fn filter(&self, trades: &[Trade]) -> FilteredWindow {
        let values: Vec<f64> = trades
            .iter()
            .map(|trade| self.scale.forward(trade.price()))
            .collect();
        let mut kept: Vec<usize> = (0..trades.len()).collect();
        let mut passes = 0;

        let status = loop {
            if kept.len() < self.min_trades {
                break FilterStatus::TooFewTrades;
            }
            let Some((lower, upper)) = self.bounds(kept.iter().map(|&index| values[index])) else {
                break FilterStatus::ZeroDispersion;
            };

            let next: Vec<usize> = kept
                .iter()
                .copied()
                .filter(|&index| values[index] >= lower && values[index] <= upper)
                .collect();
            if next.len() == kept.len() {
                break FilterStatus::Converged;
            }

            kept = next;
            passes += 1;
        };

        let removed = trades.len() - kept.len();
        if removed > 0 {
            debug!(
                window = trades.len(),
                removed,
                passes,
                status = ?status,
                "Outliers removed"
            );
        }

        FilteredWindow {
            trades: kept.into_iter().map(|index| trades[index]).collect(),
            removed,
            passes,
            status,
        }
    }

    /// Inclusive keep-bounds for a set of values, or `None` when the MAD is
    /// zero.
    fn bounds(&self, values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
        let mut sorted: Vec<f64> = values.collect();
        sorted.sort_unstable_by(f64::total_cmp);
        let center = median_sorted(&sorted)?;

        let mut deviations: Vec<f64> = sorted.iter().map(|value| (value - center).abs()).collect();
        deviations.sort_unstable_by(f64::total_cmp);
        let mad = median_sorted(&deviations)?;
        if mad <= 0.0 || !mad.is_finite() {
            return None;
        }

        let reach = self.mad_multiplier * mad;
        Some((center - reach, center + reach))
    }
}
