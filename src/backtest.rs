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
//! Causal coverage backtest of published estimates.
//!
//! Each estimate governs the trades that happened at or after its own
//! timestamp, up to the next estimate (or the configured horizon,
//! whichever comes first). Coverage is the share of governed trades priced
//! at or below their governing floor. Trades earlier than every estimate
//! are never judged, so nothing used to compute an estimate can count
//! toward its own coverage.

use serde::{Deserialize, Serialize};

use crate::config::PredictorConfig;
use crate::error::{FloorPriceError, Result};
use crate::trade::{Estimate, Trade};

/// Realised coverage over one backtest window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Y, on the `[0, 100]` scale.
    pub coverage_pct: f64,
    /// Trades governed by some estimate.
    pub sample_size: usize,
    /// Governed trades at or below their floor.
    pub covered: usize,
}

/// Computes realised coverage Y for a sequence of past estimates.
///
/// # Example
/// ```rust
/// use floorprice::backtest::BacktestEvaluator;
/// use floorprice::trade::{Estimate, Trade};
///
/// let evaluator = BacktestEvaluator::new(4, None).unwrap();
/// let estimates = [Estimate { timestamp_ms: 100, floor_price: 2.0, z: 5.0, sample_size: 50 }];
/// let trades: Vec<Trade> = [1.5, 2.5, 3.0, 4.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &price)| Trade::new(price, 100 + i as u64).unwrap())
///     .collect();
///
/// let result = evaluator.evaluate(&estimates, &trades).unwrap();
/// assert_eq!(result.coverage_pct, 25.0);
/// ```
#[derive(Debug, Clone)]
pub struct BacktestEvaluator {
    min_sample: usize,
    horizon_ms: Option<u64>,
}

impl BacktestEvaluator {
    /// Creates an evaluator requiring `min_sample` governed trades.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] when `min_sample` is zero
    /// or `horizon_ms` is `Some(0)`.
    pub fn new(min_sample: usize, horizon_ms: Option<u64>) -> Result<Self> {
        if min_sample == 0 {
            return Err(FloorPriceError::Configuration(
                "min_backtest_sample must be >= 1, got 0".into(),
            ));
        }
        if horizon_ms == Some(0) {
            return Err(FloorPriceError::Configuration(
                "backtest_horizon_ms must be > 0 when set".into(),
            ));
        }

        Ok(Self {
            min_sample,
            horizon_ms,
        })
    }

    /// Creates an evaluator from the predictor settings.
    pub fn from_config(config: &PredictorConfig) -> Result<Self> {
        Self::new(config.min_backtest_sample, config.backtest_horizon_ms)
    }

    /// Returns the governed trade count needed for a result.
    pub fn min_sample(&self) -> usize {
        self.min_sample
    }

    /// Judges `trades` against `estimates`. Both slices must be sorted by
    /// timestamp.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::InsufficientBacktestSample`] when fewer
    /// than `min_sample` trades are governed by an estimate.
    pub fn evaluate(&self, estimates: &[Estimate], trades: &[Trade]) -> Result<BacktestResult> {
        let mut sample_size = 0_usize;
        let mut covered = 0_usize;

        for trade in trades {
            let Some(estimate) = self.governing(estimates, trade.timestamp_ms()) else {
                continue;
            };
            sample_size += 1;
            if trade.price() <= estimate.floor_price {
                covered += 1;
            }
        }

        if sample_size < self.min_sample {
            return Err(FloorPriceError::InsufficientBacktestSample {
                required: self.min_sample,
                available: sample_size,
            });
        }

        Ok(BacktestResult {
            coverage_pct: covered as f64 * 100.0 / sample_size as f64,
            sample_size,
            covered,
        })
    }

    /// Latest estimate published at or before `timestamp_ms`, if it is
    /// still within its horizon.
    fn governing<'a>(&self, estimates: &'a [Estimate], timestamp_ms: u64) -> Option<&'a Estimate> {
        let index = estimates.partition_point(|estimate| estimate.timestamp_ms <= timestamp_ms);
        let estimate = estimates.get(index.checked_sub(1)?)?;

        match self.horizon_ms {
            Some(horizon) if timestamp_ms - estimate.timestamp_ms >= horizon => None,
            _ => Some(estimate),
        }
    }
}
