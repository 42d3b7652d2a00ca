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
//! Proportional feedback on the percentile parameter Z.
//!
//! ```text
//! error  = Y - X
//! Z_next = clamp(Z - k * error, z_min, z_max)      when |error| > dead_band
//! ```
//!
//! Realised coverage above target means the floor sits too high, so Z goes
//! down; coverage below target raises it. The step can additionally be
//! capped (`max_step`) and spaced in time (`min_adjust_interval_ms`). There
//! is no integral term: every adjustment depends only on the latest
//! backtest.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backtest::BacktestResult;
use crate::config::ControllerConfig;
use crate::error::{FloorPriceError, Result};

/// Controller memory for one collection. Persisted between cycles by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileState {
    /// Current percentile parameter, on the `[0, 100]` scale.
    pub z: f64,
    /// Time of the last applied adjustment.
    pub last_adjusted_at_ms: Option<u64>,
}

/// Why an adjustment step left Z unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldReason {
    /// The backtest did not govern enough trades.
    InsufficientSample { required: usize, available: usize },
    /// The backtest failed for another reason.
    NoCoverage,
    /// `|Y - X|` is inside the dead-band.
    WithinDeadBand { error: f64 },
    /// The previous adjustment is too recent.
    RateLimited { next_allowed_ms: u64 },
    /// Z already sits on the bound the error pushes toward.
    AtBound,
}

/// Outcome of one adjustment step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    Adjusted { from: f64, to: f64, error: f64 },
    Unchanged(HoldReason),
}

impl Adjustment {
    /// Returns true if Z moved.
    pub fn is_adjusted(&self) -> bool {
        matches!(self, Self::Adjusted { .. })
    }
}

/// Bounded, rate-limited proportional controller.
///
/// # Example
/// ```rust
/// use floorprice::config::ControllerConfig;
/// use floorprice::controller::AdaptiveController;
///
/// let controller = AdaptiveController::new(&ControllerConfig {
///     target_pct: 10.0,
///     initial_z: 10.0,
///     z_min: 1.0,
///     z_max: 30.0,
///     gain: 0.5,
///     ..ControllerConfig::default()
/// })
/// .unwrap();
///
/// // 16% of trades fell below the floor: too high, lower Z by 0.5 * 6.
/// assert_eq!(controller.next_z(10.0, 16.0), 7.0);
/// // 4%: too low, raise Z.
/// assert_eq!(controller.next_z(10.0, 4.0), 13.0);
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    target_pct: f64,
    initial_z: f64,
    z_min: f64,
    z_max: f64,
    gain: f64,
    dead_band: f64,
    max_step: Option<f64>,
    min_adjust_interval_ms: u64,
}

impl AdaptiveController {
    /// Creates a controller.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] when the configuration is
    /// invalid (target outside `(0, 100)`, inverted or out-of-range Z
    /// bounds, non-positive gain, ...).
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            target_pct: config.target_pct,
            initial_z: config.initial_z,
            z_min: config.z_min,
            z_max: config.z_max,
            gain: config.gain,
            dead_band: config.dead_band,
            max_step: config.max_step,
            min_adjust_interval_ms: config.min_adjust_interval_ms,
        })
    }

    /// Returns the target coverage X.
    pub fn target_pct(&self) -> f64 {
        self.target_pct
    }

    /// Returns the inclusive `(z_min, z_max)` bounds.
    pub fn z_range(&self) -> (f64, f64) {
        (self.z_min, self.z_max)
    }

    /// State for a collection seen for the first time.
    pub fn initial_state(&self) -> PercentileState {
        PercentileState {
            z: self.initial_z,
            last_adjusted_at_ms: None,
        }
    }

    /// Brings a (possibly persisted under another config) state back into
    /// the configured Z range.
    pub fn sanitize(&self, state: PercentileState) -> PercentileState {
        let z = if state.z.is_finite() {
            self.clamp(state.z)
        } else {
            self.initial_z
        };
        PercentileState { z, ..state }
    }

    /// Returns `z` limited to the configured range.
    pub fn clamp(&self, z: f64) -> f64 {
        z.clamp(self.z_min, self.z_max)
    }

    /// Pure proportional step for realised coverage `coverage_pct`, without
    /// time-based rate limiting.
    pub fn next_z(&self, z: f64, coverage_pct: f64) -> f64 {
        let error = coverage_pct - self.target_pct;
        if error.abs() <= self.dead_band {
            return z;
        }

        let mut step = -self.gain * error;
        if let Some(max_step) = self.max_step {
            step = step.clamp(-max_step, max_step);
        }
        self.clamp(z + step)
    }

    /// Applies one adjustment to `state` from a backtest outcome.
    pub fn adjust(
        &self,
        state: &mut PercentileState,
        backtest: &Result<BacktestResult>,
        now_ms: u64,
    ) -> Adjustment {
        let result = match backtest {
            Ok(result) => result,
            Err(FloorPriceError::InsufficientBacktestSample {
                required,
                available,
            }) => {
                debug!(required, available, z = state.z, "Backtest sample too small, Z held");
                return Adjustment::Unchanged(HoldReason::InsufficientSample {
                    required: *required,
                    available: *available,
                });
            }
            Err(err) => {
                debug!(error = %err, z = state.z, "Backtest failed, Z held");
                return Adjustment::Unchanged(HoldReason::NoCoverage);
            }
        };

        let error = result.coverage_pct - self.target_pct;
        if error.abs() <= self.dead_band {
            debug!(
                coverage = result.coverage_pct,
                target = self.target_pct,
                z = state.z,
                "Coverage within dead-band"
            );
            return Adjustment::Unchanged(HoldReason::WithinDeadBand { error });
        }

        if let Some(last) = state.last_adjusted_at_ms {
            let next_allowed_ms = last.saturating_add(self.min_adjust_interval_ms);
            if now_ms < next_allowed_ms {
                return Adjustment::Unchanged(HoldReason::RateLimited { next_allowed_ms });
            }
        }

        let from = state.z;
        let to = self.next_z(from, result.coverage_pct);
        if to == from {
            debug!(z = from, error, "Z pinned at bound");
            return Adjustment::Unchanged(HoldReason::AtBound);
        }

        state.z = to;
        state.last_adjusted_at_ms = Some(now_ms);
        info!(
            from,
            to,
            coverage = result.coverage_pct,
            target = self.target_pct,
            sample = result.sample_size,
            "Percentile adjusted"
        );
        Adjustment::Adjusted { from, to, error }
    }
}
