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
//! Seams to the outside world: trade sources, state stores and estimate
//! sinks, plus [`run_cycle`] which drives one predictor cycle through them.
//!
//! The predictor itself never performs I/O. `run_cycle` calls each
//! collaborator once, in order, and hands any failure back to the caller
//! without retrying.

use std::collections::HashMap;

use tracing::warn;

use crate::config::PredictorConfig;
use crate::controller::PercentileState;
use crate::error::{BoxError, FloorPriceError, Result};
use crate::predictor::{CycleReport, Predictor};
use crate::trade::{CollectionId, Estimate, Trade};

/// Supplies time-ordered trades for a collection.
pub trait TradeSource {
    /// Returns trades with timestamp `>= since_ms` (all trades when `None`),
    /// ordered by timestamp. Replaying trades at `since_ms` is allowed.
    fn fetch_trades(
        &mut self,
        collection: &CollectionId,
        since_ms: Option<u64>,
    ) -> std::result::Result<Vec<Trade>, BoxError>;
}

/// Persists controller state between cycles.
pub trait StateStore {
    fn load_state(
        &mut self,
        collection: &CollectionId,
    ) -> std::result::Result<Option<PercentileState>, BoxError>;

    fn save_state(
        &mut self,
        collection: &CollectionId,
        state: &PercentileState,
    ) -> std::result::Result<(), BoxError>;
}

/// Receives published estimates.
pub trait EstimateSink {
    fn publish_estimate(
        &mut self,
        collection: &CollectionId,
        estimate: &Estimate,
    ) -> std::result::Result<(), BoxError>;
}

impl Predictor {
    /// Builds a predictor for `collection`, resuming from `store` when it
    /// holds a state.
    ///
    /// # Errors
    /// Returns [`FloorPriceError::Configuration`] for an invalid config and
    /// [`FloorPriceError::Collaborator`] when the store fails.
    pub fn resume<S: StateStore + ?Sized>(
        collection: CollectionId,
        config: PredictorConfig,
        store: &mut S,
    ) -> Result<Self> {
        let loaded = store
            .load_state(&collection)
            .map_err(|err| collaborator_error("load_state", &collection, err))?;

        match loaded {
            Some(state) => Self::with_state(collection, config, state),
            None => Self::new(collection, config),
        }
    }
}

/// Runs one cycle: fetch new trades, tick, save state, publish the estimate.
///
/// # Errors
/// Returns [`FloorPriceError::Collaborator`] naming the failing call. A
/// failed fetch leaves the predictor untouched; a failed save or publish
/// happens after the tick, so the in-memory state has already advanced.
pub fn run_cycle<T, S, E>(
    predictor: &mut Predictor,
    source: &mut T,
    store: &mut S,
    sink: &mut E,
    now_ms: u64,
) -> Result<CycleReport>
where
    T: TradeSource + ?Sized,
    S: StateStore + ?Sized,
    E: EstimateSink + ?Sized,
{
    let collection = predictor.collection().clone();
    let trades = source
        .fetch_trades(&collection, predictor.cursor())
        .map_err(|err| collaborator_error("fetch_trades", &collection, err))?;

    let report = predictor.tick(now_ms, &trades);

    store
        .save_state(&collection, predictor.state())
        .map_err(|err| collaborator_error("save_state", &collection, err))?;
    if let Some(estimate) = report.estimate() {
        sink.publish_estimate(&collection, estimate)
            .map_err(|err| collaborator_error("publish_estimate", &collection, err))?;
    }

    Ok(report)
}

fn collaborator_error(
    stage: &'static str,
    collection: &CollectionId,
    source: BoxError,
) -> FloorPriceError {
    warn!(%collection, stage, error = %source, "Collaborator call failed");
    FloorPriceError::Collaborator { stage, source }
}

/// In-memory trade source. `fetch_trades` replays trades at `since_ms`,
/// like most timestamp-cursor APIs do.
#[derive(Debug, Clone, Default)]
pub struct MemoryTradeSource {
    trades: HashMap<CollectionId, Vec<Trade>>,
}

impl MemoryTradeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends trades for a collection; they must not predate earlier ones.
    pub fn push(&mut self, collection: &CollectionId, trades: impl IntoIterator<Item = Trade>) {
        self.trades
            .entry(collection.clone())
            .or_default()
            .extend(trades);
    }
}

impl TradeSource for MemoryTradeSource {
    fn fetch_trades(
        &mut self,
        collection: &CollectionId,
        since_ms: Option<u64>,
    ) -> std::result::Result<Vec<Trade>, BoxError> {
        let Some(trades) = self.trades.get(collection) else {
            return Ok(Vec::new());
        };
        let start = since_ms.map_or(0, |since| {
            trades.partition_point(|trade| trade.timestamp_ms() < since)
        });
        Ok(trades[start..].to_vec())
    }
}

/// In-memory state store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: HashMap<CollectionId, PercentileState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last state saved for `collection`.
    pub fn get(&self, collection: &CollectionId) -> Option<&PercentileState> {
        self.states.get(collection)
    }
}

impl StateStore for MemoryStateStore {
    fn load_state(
        &mut self,
        collection: &CollectionId,
    ) -> std::result::Result<Option<PercentileState>, BoxError> {
        Ok(self.states.get(collection).copied())
    }

    fn save_state(
        &mut self,
        collection: &CollectionId,
        state: &PercentileState,
    ) -> std::result::Result<(), BoxError> {
        self.states.insert(collection.clone(), *state);
        Ok(())
    }
}

/// In-memory estimate sink keeping every published estimate.
#[derive(Debug, Clone, Default)]
pub struct MemoryEstimateSink {
    estimates: HashMap<CollectionId, Vec<Estimate>>,
}

impl MemoryEstimateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every estimate published for `collection`, oldest first.
    pub fn estimates(&self, collection: &CollectionId) -> &[Estimate] {
        self.estimates
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl EstimateSink for MemoryEstimateSink {
    fn publish_estimate(
        &mut self,
        collection: &CollectionId,
        estimate: &Estimate,
    ) -> std::result::Result<(), BoxError> {
        self.estimates
            .entry(collection.clone())
            .or_default()
            .push(*estimate);
        Ok(())
    }
}
