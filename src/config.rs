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
//! Predictor configuration.
//!
//! All knobs of the control loop live here and are externally settable.
//! Defaults mirror the production settings the estimator was tuned with:
//! a 140-trade estimation lookback, an 800-trade backtest window and a 5%
//! target held inside `[2, 10]`.

use serde::{Deserialize, Serialize};

use crate::error::{FloorPriceError, Result};

/// Scale on which prices are filtered and quantiles are interpolated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceScale {
    /// Raw prices.
    Linear,
    /// Natural log of prices; the resulting quantile is exponentiated back.
    #[default]
    Log,
}

impl PriceScale {
    /// Maps a price onto this scale.
    pub fn forward(self, price: f64) -> f64 {
        match self {
            Self::Linear => price,
            Self::Log => price.ln(),
        }
    }

    /// Maps a value on this scale back to a price.
    pub fn inverse(self, value: f64) -> f64 {
        match self {
            Self::Linear => value,
            Self::Log => value.exp(),
        }
    }
}

/// Bounds of a rolling window, by count and optionally by age.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum number of most recent trades in the window.
    pub max_trades: usize,
    /// Trades older than `now - max_age_ms` fall out of the window.
    #[serde(default)]
    pub max_age_ms: Option<u64>,
}

impl WindowConfig {
    /// Returns a window bounded by trade count only.
    pub fn by_count(max_trades: usize) -> Self {
        Self {
            max_trades,
            max_age_ms: None,
        }
    }

    /// Oldest timestamp still inside the window at `now`.
    pub fn cutoff(&self, now_ms: u64) -> u64 {
        self.max_age_ms.map_or(0, |age| now_ms.saturating_sub(age))
    }
}

/// Outlier filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Trades further than `mad_multiplier × MAD` from the median are dropped.
    pub mad_multiplier: f64,
    /// Below this many trades the window is returned unfiltered.
    pub min_filter_trades: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            mad_multiplier: 3.0,
            min_filter_trades: 10,
        }
    }
}

/// Adaptive controller parameters. Percentages are on the `[0, 100]` scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Target coverage X.
    pub target_pct: f64,
    /// Z used before the first adjustment.
    pub initial_z: f64,
    pub z_min: f64,
    pub z_max: f64,
    /// Proportional gain k in `Z - k × (Y - X)`.
    pub gain: f64,
    /// No adjustment while `|Y - X| <= dead_band`.
    pub dead_band: f64,
    /// Largest allowed change of Z in one adjustment.
    pub max_step: Option<f64>,
    /// Minimum time between two adjustments.
    pub min_adjust_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_pct: 5.0,
            initial_z: 5.0,
            z_min: 2.0,
            z_max: 10.0,
            gain: 0.5,
            dead_band: 0.0,
            max_step: None,
            min_adjust_interval_ms: 0,
        }
    }
}

/// Full configuration of one collection's predictor.
///
/// # Example
/// ```rust
/// use floorprice::config::PredictorConfig;
///
/// let config = PredictorConfig::from_json_str(
///     r#"{ "controller": { "target_pct": 10.0, "initial_z": 10.0, "z_max": 30.0 } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.controller.target_pct, 10.0);
/// assert_eq!(config.backtest_every, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub outlier: OutlierConfig,
    pub controller: ControllerConfig,
    /// Fewest filtered trades an estimate may be computed from.
    pub min_estimate_trades: usize,
    /// Fewest governed trades a backtest needs to report coverage.
    pub min_backtest_sample: usize,
    /// Recent trades feeding the live estimate.
    pub estimation_window: WindowConfig,
    /// Trades used to audit published estimates.
    pub backtest_window: WindowConfig,
    /// Run a backtest once every this many estimation cycles.
    pub backtest_every: u64,
    /// An estimate governs trades for at most this long after publication.
    pub backtest_horizon_ms: Option<u64>,
    pub price_scale: PriceScale,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            outlier: OutlierConfig::default(),
            controller: ControllerConfig::default(),
            min_estimate_trades: 10,
            min_backtest_sample: 100,
            estimation_window: WindowConfig::by_count(140),
            backtest_window: WindowConfig::by_count(800),
            backtest_every: 1,
            backtest_horizon_ms: None,
            price_scale: PriceScale::Log,
        }
    }
}

impl PredictorConfig {
    /// Parses a JSON document; absent fields take their defaults.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] when the document does not
    /// parse or the resulting configuration is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| FloorPriceError::Configuration(format!("malformed config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every static invariant of the configuration.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> Result<()> {
        self.outlier.validate()?;
        self.controller.validate()?;

        if self.min_estimate_trades == 0 {
            return Err(config_error("min_estimate_trades must be >= 1, got 0"));
        }
        if self.min_backtest_sample == 0 {
            return Err(config_error("min_backtest_sample must be >= 1, got 0"));
        }
        if self.estimation_window.max_trades < self.min_estimate_trades {
            return Err(config_error(format!(
                "estimation_window.max_trades ({}) must be >= min_estimate_trades ({})",
                self.estimation_window.max_trades, self.min_estimate_trades
            )));
        }
        if self.backtest_window.max_trades == 0 {
            return Err(config_error("backtest_window.max_trades must be >= 1, got 0"));
        }
        if self.backtest_every == 0 {
            return Err(config_error("backtest_every must be >= 1, got 0"));
        }
        if self.backtest_horizon_ms == Some(0) {
            return Err(config_error("backtest_horizon_ms must be > 0 when set"));
        }
        Ok(())
    }
}

impl OutlierConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.mad_multiplier.is_finite() || self.mad_multiplier <= 0.0 {
            return Err(config_error(format!(
                "mad_multiplier must be finite and > 0.0, got {}",
                self.mad_multiplier
            )));
        }
        if self.min_filter_trades == 0 {
            return Err(config_error("min_filter_trades must be >= 1, got 0"));
        }
        Ok(())
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        let in_open_percent = |value: f64| value.is_finite() && value > 0.0 && value < 100.0;

        if !in_open_percent(self.target_pct) {
            return Err(config_error(format!(
                "target_pct must be in (0.0, 100.0), got {}",
                self.target_pct
            )));
        }
        if !in_open_percent(self.z_min) || !in_open_percent(self.z_max) {
            return Err(config_error(format!(
                "z_min and z_max must be in (0.0, 100.0), got [{}, {}]",
                self.z_min, self.z_max
            )));
        }
        if self.z_min > self.z_max {
            return Err(config_error(format!(
                "z_min ({}) must not exceed z_max ({})",
                self.z_min, self.z_max
            )));
        }
        if !(self.z_min..=self.z_max).contains(&self.initial_z) {
            return Err(config_error(format!(
                "initial_z must be in [{}, {}], got {}",
                self.z_min, self.z_max, self.initial_z
            )));
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(config_error(format!(
                "gain must be finite and > 0.0, got {}",
                self.gain
            )));
        }
        if !self.dead_band.is_finite() || self.dead_band < 0.0 {
            return Err(config_error(format!(
                "dead_band must be finite and >= 0.0, got {}",
                self.dead_band
            )));
        }
        if let Some(step) = self.max_step {
            if !step.is_finite() || step <= 0.0 {
                return Err(config_error(format!(
                    "max_step must be finite and > 0.0 when set, got {step}"
                )));
            }
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> FloorPriceError {
    FloorPriceError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::{ControllerConfig, PredictorConfig, PriceScale, WindowConfig};
    use crate::error::FloorPriceError;

    #[test]
    fn defaults_are_valid() {
        PredictorConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_target_outside_open_percent_range() {
        for target in [0.0, 100.0, -1.0, f64::NAN] {
            let mut config = PredictorConfig::default();
            config.controller.target_pct = target;
            assert!(
                matches!(config.validate(), Err(FloorPriceError::Configuration(_))),
                "target={target}"
            );
        }
    }

    #[test]
    fn rejects_inverted_z_range() {
        let controller = ControllerConfig {
            z_min: 8.0,
            z_max: 4.0,
            initial_z: 5.0,
            ..ControllerConfig::default()
        };
        assert!(controller.validate().is_err());
    }

    #[test]
    fn rejects_initial_z_outside_range() {
        let controller = ControllerConfig {
            initial_z: 50.0,
            ..ControllerConfig::default()
        };
        assert!(controller.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_gain() {
        for gain in [0.0, -0.5] {
            let controller = ControllerConfig {
                gain,
                ..ControllerConfig::default()
            };
            assert!(controller.validate().is_err(), "gain={gain}");
        }
    }

    #[test]
    fn rejects_zero_cadence_and_counts() {
        let mut config = PredictorConfig::default();
        config.backtest_every = 0;
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.min_backtest_sample = 0;
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.estimation_window = WindowConfig::by_count(5);
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.outlier.mad_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_overrides_only_given_fields() {
        let config = PredictorConfig::from_json_str(
            r#"{
                "price_scale": "linear",
                "backtest_every": 4,
                "estimation_window": { "max_trades": 200, "max_age_ms": 86400000 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.price_scale, PriceScale::Linear);
        assert_eq!(config.backtest_every, 4);
        assert_eq!(config.estimation_window.max_age_ms, Some(86_400_000));
        assert_eq!(config.controller, ControllerConfig::default());
        assert_eq!(config.backtest_window.max_trades, 800);
    }

    #[test]
    fn json_with_invalid_values_is_rejected() {
        let err = PredictorConfig::from_json_str(r#"{ "controller": { "gain": -1.0 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("gain"), "{err}");

        assert!(PredictorConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn window_cutoff_saturates() {
        let window = WindowConfig {
            max_trades: 10,
            max_age_ms: Some(1_000),
        };
        assert_eq!(window.cutoff(400), 0);
        assert_eq!(window.cutoff(5_000), 4_000);
        assert_eq!(WindowConfig::by_count(10).cutoff(5_000), 0);
    }

    #[test]
    fn log_scale_round_trips_prices() {
        let price = 3.75;
        let back = PriceScale::Log.inverse(PriceScale::Log.forward(price));
        assert!((back - price).abs() < 1e-12);
        assert_eq!(PriceScale::Linear.forward(price), price);
    }
}
