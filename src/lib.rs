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
//! Adaptive-percentile floor price estimation over trade streams.
//!
//! A floor price is the level below which only a target share X% of trades
//! should fall. A fixed percentile drifts away from that target whenever the
//! price distribution changes shape, so the percentile parameter Z is itself
//! steered by a feedback loop:
//!
//! 1. [`outlier::OutlierFilter`] drops extreme prints from the recent window
//!    with a median-absolute-deviation rule.
//! 2. [`quantile::percentile_sorted`] takes the Z-th percentile of what is
//!    left; that is the published [`trade::Estimate`].
//! 3. [`backtest::BacktestEvaluator`] periodically measures the realised
//!    coverage Y of past estimates against the trades that followed them.
//! 4. [`controller::AdaptiveController`] nudges Z by `-k × (Y - X)`, within
//!    `[z_min, z_max]` and outside a dead-band.
//!
//! [`predictor::Predictor`] wires these into a per-collection state machine
//! and [`collaborator::run_cycle`] drives it through external trade sources,
//! state stores and estimate sinks. Predictors share no state; running many
//! collections concurrently only needs one predictor each.
//!
//! The crate logs through [`tracing`] and never installs a subscriber.

pub mod backtest;
pub mod collaborator;
pub mod config;
pub mod controller;
pub mod error;
pub mod outlier;
pub mod predictor;
pub mod quantile;
pub mod trade;
pub mod window;

pub use backtest::{BacktestEvaluator, BacktestResult};
pub use collaborator::{EstimateSink, StateStore, TradeSource, run_cycle};
pub use config::{ControllerConfig, OutlierConfig, PredictorConfig, PriceScale, WindowConfig};
pub use controller::{AdaptiveController, Adjustment, HoldReason, PercentileState};
pub use error::{BoxError, FloorPriceError, Result};
pub use outlier::{FilterStatus, FilteredWindow, OutlierFilter};
pub use predictor::{CycleReport, EstimateOutcome, Phase, Predictor};
pub use trade::{CollectionId, Estimate, Trade};
pub use window::{IngestStats, TradeWindow};
