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
//! Per-collection floor price predictor.
//!
//! A [`Predictor`] is a small sequential state machine driven by an external
//! scheduler tick:
//!
//! ```text
//! Idle --(enough trades)--> Estimating --(every N cycles)--> Backtesting
//!                              ^                                  |
//!                              +------------ Adjusting <----------+
//! ```
//!
//! Every tick ingests new trades, filters the estimation window, publishes a
//! Z-quantile estimate and, on the backtest cadence, audits past estimates
//! and moves Z. Predictors share nothing, so callers can run one per
//! collection on as many threads as they like.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::backtest::{BacktestEvaluator, BacktestResult};
use crate::config::PredictorConfig;
use crate::controller::{AdaptiveController, Adjustment, PercentileState};
use crate::error::{FloorPriceError, Result};
use crate::outlier::{FilterStatus, OutlierFilter};
use crate::quantile::percentile_sorted;
use crate::trade::{CollectionId, Estimate, Trade};
use crate::window::{IngestStats, TradeWindow};

/// Lifecycle phase of a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the estimation window to reach the minimum trade count.
    Idle,
    Estimating,
    Backtesting,
    Adjusting,
}

/// Whether a cycle produced an estimate.
#[derive(Debug)]
pub enum EstimateOutcome {
    Published(Estimate),
    Skipped(FloorPriceError),
}

/// Summary of the filter step of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    pub window: usize,
    pub removed: usize,
    pub status: FilterStatus,
}

/// Everything that happened during one tick.
#[derive(Debug)]
pub struct CycleReport {
    /// Estimation cycles run so far, including this one. Zero while idle.
    pub cycle: u64,
    /// Phase the predictor rests in after the tick.
    pub phase: Phase,
    pub ingest: IngestStats,
    pub filter: Option<FilterSummary>,
    pub estimate: EstimateOutcome,
    /// Present on backtest cycles.
    pub backtest: Option<Result<BacktestResult>>,
    /// Present on backtest cycles.
    pub adjustment: Option<Adjustment>,
}

impl CycleReport {
    /// The estimate published this cycle, if any.
    pub fn estimate(&self) -> Option<&Estimate> {
        match &self.estimate {
            EstimateOutcome::Published(estimate) => Some(estimate),
            EstimateOutcome::Skipped(_) => None,
        }
    }

    /// Returns true if this cycle moved Z.
    pub fn z_adjusted(&self) -> bool {
        self.adjustment.is_some_and(|adjustment| adjustment.is_adjusted())
    }
}

/// Adaptive-percentile floor price estimator for one collection.
///
/// # Example
/// ```rust
/// use floorprice::config::{PredictorConfig, PriceScale, WindowConfig};
/// use floorprice::predictor::Predictor;
/// use floorprice::trade::Trade;
///
/// let config = PredictorConfig {
///     estimation_window: WindowConfig::by_count(50),
///     price_scale: PriceScale::Linear,
///     ..PredictorConfig::default()
/// };
/// let mut predictor = Predictor::new("demo".into(), config).unwrap();
///
/// let trades: Vec<Trade> = (0..50)
///     .map(|i| Trade::new(1.0 + (i % 10) as f64, i * 1_000).unwrap())
///     .collect();
/// let report = predictor.tick(50_000, &trades);
///
/// let estimate = report.estimate().unwrap();
/// assert!(estimate.floor_price >= 1.0 && estimate.floor_price < 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct Predictor {
    collection: CollectionId,
    config: PredictorConfig,
    filter: OutlierFilter,
    controller: AdaptiveController,
    evaluator: BacktestEvaluator,
    window: TradeWindow,
    history: VecDeque<Estimate>,
    state: PercentileState,
    phase: Phase,
    cycles: u64,
}

impl Predictor {
    /// Creates a predictor starting from the configured initial Z.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] for an invalid config.
    pub fn new(collection: CollectionId, config: PredictorConfig) -> Result<Self> {
        config.validate()?;

        let controller = AdaptiveController::new(&config.controller)?;
        let filter = OutlierFilter::new(&config.outlier, config.price_scale)?;
        let evaluator = BacktestEvaluator::from_config(&config)?;
        let capacity = config
            .estimation_window
            .max_trades
            .max(config.backtest_window.max_trades)
            .saturating_add(config.estimation_window.max_trades);

        Ok(Self {
            collection,
            state: controller.initial_state(),
            filter,
            controller,
            evaluator,
            window: TradeWindow::new(capacity),
            history: VecDeque::new(),
            phase: Phase::Idle,
            cycles: 0,
            config,
        })
    }

    /// Creates a predictor resuming from a persisted state.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] for an invalid config.
    pub fn with_state(
        collection: CollectionId,
        config: PredictorConfig,
        state: PercentileState,
    ) -> Result<Self> {
        let mut predictor = Self::new(collection, config)?;
        predictor.state = predictor.controller.sanitize(state);
        Ok(predictor)
    }

    /// Returns the collection this predictor estimates.
    pub fn collection(&self) -> &CollectionId {
        &self.collection
    }

    /// Returns the validated configuration.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Returns the phase the last tick ended in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Controller memory to persist after each cycle.
    pub fn state(&self) -> &PercentileState {
        &self.state
    }

    /// Returns the percentile used for the next estimate.
    pub fn z(&self) -> f64 {
        self.state.z
    }

    /// Estimates still able to govern trades in the backtest window, oldest
    /// first.
    pub fn history(&self) -> impl Iterator<Item = &Estimate> {
        self.history.iter()
    }

    /// Returns the most recent published estimate.
    pub fn last_estimate(&self) -> Option<&Estimate> {
        self.history.back()
    }

    /// Timestamp to fetch new trades from.
    pub fn cursor(&self) -> Option<u64> {
        self.window.cursor()
    }

    /// Returns the retained trades.
    pub fn window(&self) -> &TradeWindow {
        &self.window
    }

    /// Runs one cycle at `now_ms` after appending `trades`.
    ///
    /// Never fails: insufficient data and insufficient backtest samples are
    /// reported in the [`CycleReport`] and retried on the next tick.
    pub fn tick(&mut self, now_ms: u64, trades: &[Trade]) -> CycleReport {
        let ingest = self.window.ingest(trades);
        self.window.evict_before(
            self.config
                .estimation_window
                .cutoff(now_ms)
                .min(self.config.backtest_window.cutoff(now_ms)),
        );

        let recent = self.window.recent_before(now_ms, &self.config.estimation_window);
        if self.phase == Phase::Idle {
            if recent.len() < self.config.min_estimate_trades {
                trace!(
                    collection = %self.collection,
                    available = recent.len(),
                    required = self.config.min_estimate_trades,
                    "Waiting for trades"
                );
                return CycleReport {
                    cycle: 0,
                    phase: Phase::Idle,
                    ingest,
                    filter: None,
                    estimate: EstimateOutcome::Skipped(FloorPriceError::InsufficientData {
                        required: self.config.min_estimate_trades,
                        available: recent.len(),
                    }),
                    backtest: None,
                    adjustment: None,
                };
            }
            self.transition(Phase::Estimating);
        }

        self.cycles += 1;
        let (filter, estimate) = self.estimate(now_ms, &recent);

        let mut backtest = None;
        let mut adjustment = None;
        if self.cycles % self.config.backtest_every == 0 {
            self.transition(Phase::Backtesting);
            let audited = self.window.recent_before(now_ms, &self.config.backtest_window);
            let result = self.evaluator.evaluate(self.history.make_contiguous(), &audited);

            self.transition(Phase::Adjusting);
            adjustment = Some(self.controller.adjust(&mut self.state, &result, now_ms));
            backtest = Some(result);
            self.transition(Phase::Estimating);
        }

        self.prune_history();

        CycleReport {
            cycle: self.cycles,
            phase: self.phase,
            ingest,
            filter: Some(filter),
            estimate,
            backtest,
            adjustment,
        }
    }

    fn estimate(&mut self, now_ms: u64, recent: &[Trade]) -> (FilterSummary, EstimateOutcome) {
        let filtered = self.filter.filter(recent);
        let summary = FilterSummary {
            window: recent.len(),
            removed: filtered.removed,
            status: filtered.status,
        };

        if filtered.len() < self.config.min_estimate_trades {
            return (
                summary,
                EstimateOutcome::Skipped(FloorPriceError::InsufficientData {
                    required: self.config.min_estimate_trades,
                    available: filtered.len(),
                }),
            );
        }
        if self
            .history
            .back()
            .is_some_and(|last| last.timestamp_ms > now_ms)
        {
            return (
                summary,
                EstimateOutcome::Skipped(FloorPriceError::InvalidParameter(
                    "cycle time precedes the last published estimate",
                )),
            );
        }

        let scale = self.config.price_scale;
        let mut values: Vec<f64> = filtered
            .trades
            .iter()
            .map(|trade| scale.forward(trade.price()))
            .collect();
        values.sort_unstable_by(f64::total_cmp);

        let value = match percentile_sorted(&values, self.state.z) {
            Ok(value) => value,
            Err(err) => return (summary, EstimateOutcome::Skipped(err)),
        };
        let estimate = Estimate {
            timestamp_ms: now_ms,
            floor_price: scale.inverse(value),
            z: self.state.z,
            sample_size: filtered.len(),
        };

        self.record(estimate);
        debug!(
            collection = %self.collection,
            floor_price = estimate.floor_price,
            z = estimate.z,
            sample = estimate.sample_size,
            removed = summary.removed,
            "Floor price estimated"
        );
        (summary, EstimateOutcome::Published(estimate))
    }

    /// Appends an estimate, replacing the previous one when it never got to
    /// govern a trade.
    fn record(&mut self, estimate: Estimate) {
        if let Some(last) = self.history.back() {
            let span = last.timestamp_ms..estimate.timestamp_ms;
            let governed = self
                .window
                .iter()
                .any(|trade| span.contains(&trade.timestamp_ms()));
            if !governed {
                self.history.pop_back();
            }
        }
        self.history.push_back(estimate);
    }

    /// Drops estimates superseded before the oldest retained trade.
    fn prune_history(&mut self) {
        let Some(oldest) = self.window.iter().next().map(Trade::timestamp_ms) else {
            return;
        };
        while self.history.len() > 1 && self.history[1].timestamp_ms <= oldest {
            self.history.pop_front();
        }
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            trace!(collection = %self.collection, from = ?self.phase, to = ?next, "Phase change");
            self.phase = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EstimateOutcome, Phase, Predictor};
    use crate::config::{ControllerConfig, PredictorConfig, PriceScale, WindowConfig};
    use crate::controller::{Adjustment, HoldReason, PercentileState};
    use crate::error::FloorPriceError;
    use crate::trade::Trade;

    fn config() -> PredictorConfig {
        PredictorConfig {
            controller: ControllerConfig {
                target_pct: 10.0,
                initial_z: 10.0,
                z_min: 2.0,
                z_max: 30.0,
                gain: 0.5,
                ..ControllerConfig::default()
            },
            min_estimate_trades: 20,
            min_backtest_sample: 30,
            estimation_window: WindowConfig::by_count(50),
            backtest_window: WindowConfig::by_count(200),
            backtest_every: 3,
            price_scale: PriceScale::Linear,
            ..PredictorConfig::default()
        }
    }

    /// Deterministic prices cycling through 1.0, 1.1, ..., 10.9.
    fn stream(from: u64, to: u64) -> Vec<Trade> {
        (from..to)
            .map(|i| Trade::new(1.0 + ((i * 37) % 100) as f64 * 0.1, i * 1_000).unwrap())
            .collect()
    }

    #[test]
    fn stays_idle_until_minimum_trades() {
        let mut predictor = Predictor::new("c".into(), config()).unwrap();
        let report = predictor.tick(10_000, &stream(0, 10));

        assert_eq!(report.phase, Phase::Idle);
        assert_eq!(report.cycle, 0);
        assert!(matches!(
            report.estimate,
            EstimateOutcome::Skipped(FloorPriceError::InsufficientData {
                required: 20,
                available: 10
            })
        ));

        let report = predictor.tick(20_000, &stream(10, 20));
        assert_eq!(report.phase, Phase::Estimating);
        assert_eq!(report.cycle, 1);
        assert!(report.estimate().is_some());
    }

    #[test]
    fn estimate_uses_only_trades_before_now() {
        let mut predictor = Predictor::new("c".into(), config()).unwrap();
        let mut trades = stream(0, 30);
        // Arrives with the cycle timestamp; must wait for the next cycle.
        trades.push(Trade::new(0.01, 30_000).unwrap());

        let report = predictor.tick(30_000, &trades);
        let estimate = report.estimate().unwrap();
        assert_eq!(estimate.sample_size, 30);
        assert!(estimate.floor_price > 1.0);
        assert_eq!(estimate.timestamp_ms, 30_000);
    }

    #[test]
    fn backtests_on_configured_cadence() {
        let mut predictor = Predictor::new("c".into(), config()).unwrap();
        let mut backtest_cycles = Vec::new();
        for step in 1..=9_u64 {
            let report = predictor.tick(step * 20_000, &stream((step - 1) * 20, step * 20));
            if report.backtest.is_some() {
                assert!(report.adjustment.is_some());
                backtest_cycles.push(report.cycle);
            }
        }
        assert_eq!(backtest_cycles, vec![3, 6, 9]);
    }

    #[test]
    fn first_backtest_without_governed_trades_is_a_no_op() {
        let mut config = config();
        config.backtest_every = 1;
        let mut predictor = Predictor::new("c".into(), config).unwrap();

        let report = predictor.tick(40_000, &stream(0, 40));
        assert_eq!(
            report.adjustment,
            Some(Adjustment::Unchanged(HoldReason::InsufficientSample {
                required: 30,
                available: 0
            }))
        );
        assert_eq!(predictor.z(), 10.0);
    }

    #[test]
    fn floor_set_too_high_pushes_z_down() {
        let mut config = config();
        config.backtest_every = 1;
        let mut predictor = Predictor::new("c".into(), config).unwrap();
        predictor.tick(50_000, &stream(0, 50));

        // Every later trade lands below the published floor.
        let cheap: Vec<Trade> = (50..100)
            .map(|i| Trade::new(0.5, i * 1_000).unwrap())
            .collect();
        let report = predictor.tick(100_000, &cheap);

        match report.adjustment {
            Some(Adjustment::Adjusted { from, to, .. }) => assert!(to < from, "{from} -> {to}"),
            other => panic!("expected adjustment, got {other:?}"),
        }
        assert_eq!(predictor.z(), 2.0);
    }

    #[test]
    fn floor_set_too_low_pushes_z_up() {
        let mut config = config();
        config.backtest_every = 1;
        let mut predictor = Predictor::new("c".into(), config).unwrap();
        predictor.tick(50_000, &stream(0, 50));

        let rich: Vec<Trade> = (50..100)
            .map(|i| Trade::new(50.0, i * 1_000).unwrap())
            .collect();
        predictor.tick(100_000, &rich);
        assert_eq!(predictor.z(), 15.0);
    }

    #[test]
    fn resumes_from_persisted_state() {
        let state = PercentileState {
            z: 99.0,
            last_adjusted_at_ms: Some(1),
        };
        let predictor = Predictor::with_state("c".into(), config(), state).unwrap();
        assert_eq!(predictor.z(), 30.0);
        assert_eq!(predictor.state().last_adjusted_at_ms, Some(1));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = config();
        config.controller.z_min = 0.0;
        assert!(matches!(
            Predictor::new("c".into(), config),
            Err(FloorPriceError::Configuration(_))
        ));
    }

    #[test]
    fn history_stays_bounded_without_new_trades() {
        let mut predictor = Predictor::new("c".into(), config()).unwrap();
        predictor.tick(50_000, &stream(0, 50));
        for step in 1..=100_u64 {
            predictor.tick(50_000 + step * 1_000, &[]);
        }
        assert_eq!(predictor.history().count(), 1);
    }

    #[test]
    fn history_is_pruned_to_retained_trades() {
        let mut predictor = Predictor::new("c".into(), config()).unwrap();
        for step in 1..=60_u64 {
            predictor.tick(step * 10_000, &stream((step - 1) * 10, step * 10));
        }
        let oldest_trade = predictor.window().iter().next().unwrap().timestamp_ms();
        let history: Vec<u64> = predictor.history().map(|e| e.timestamp_ms).collect();
        assert!(history.len() >= 2);
        assert!(history[1] > oldest_trade, "{history:?} oldest={oldest_trade}");
    }

    fn cluster_with_wash_trade(cluster: u64) -> Vec<Trade> {
        let mut trades: Vec<Trade> = (0..cluster)
            .map(|i| Trade::new(2.0 + i as f64 * 0.01, i * 1_000).unwrap())
            .collect();
        trades.push(Trade::new(0.02, cluster * 1_000).unwrap());
        trades
    }

    #[test]
    fn wash_trade_never_reaches_published_floor() {
        let mut predictor = Predictor::new("c".into(), PredictorConfig::default()).unwrap();
        let report = predictor.tick(11_000, &cluster_with_wash_trade(10));

        let filter = report.filter.unwrap();
        assert_eq!(filter.window, 11);
        assert_eq!(filter.removed, 1);
        let estimate = report.estimate().unwrap();
        assert_eq!(estimate.sample_size, 10);
        assert!(estimate.floor_price > 2.0 && estimate.floor_price < 2.01, "{estimate:?}");
    }

    #[test]
    fn window_at_minimum_with_wash_trade_is_skipped() {
        let mut predictor = Predictor::new("c".into(), PredictorConfig::default()).unwrap();
        let report = predictor.tick(10_000, &cluster_with_wash_trade(9));

        assert_eq!(report.filter.unwrap().removed, 1);
        assert!(matches!(
            report.estimate,
            EstimateOutcome::Skipped(FloorPriceError::InsufficientData {
                required: 10,
                available: 9
            })
        ));
        assert!(predictor.last_estimate().is_none());
    }

    #[test]
    fn log_scale_estimates_are_positive_prices() {
        let mut config = config();
        config.price_scale = PriceScale::Log;
        let mut predictor = Predictor::new("c".into(), config).unwrap();
        let report = predictor.tick(60_000, &stream(0, 60));
        let estimate = report.estimate().unwrap();
        // The log-scale MAD rule trims the long left tail of linearly spread prices.
        assert!(report.filter.unwrap().removed > 0);
        assert!(estimate.floor_price > 1.0 && estimate.floor_price < 5.0, "{estimate:?}");
    }
}
