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
//! Bounded, time-ordered trade buffer for one collection.
//!
//! Trade sources may replay overlapping ranges (`fetch since t` returns the
//! trades at `t` again). The window keeps a cursor on the newest timestamp
//! it has accepted and the prices seen at that timestamp, so replays are
//! recognised by timestamp, position and price and dropped.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WindowConfig;
use crate::trade::Trade;

/// Outcome of one [`TradeWindow::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Trades appended to the window.
    pub accepted: usize,
    /// Replayed trades recognised at the cursor timestamp.
    pub duplicates: usize,
    /// Trades older than the cursor.
    pub stale: usize,
}

/// Append-only window of trades ordered by timestamp.
///
/// # Example
/// ```rust
/// use floorprice::trade::Trade;
/// use floorprice::window::TradeWindow;
///
/// let mut window = TradeWindow::new(100);
/// let batch = [Trade::new(1.0, 10).unwrap(), Trade::new(1.2, 20).unwrap()];
/// window.ingest(&batch);
///
/// // A source replaying from the cursor returns the trade at t=20 again.
/// let stats = window.ingest(&[Trade::new(1.2, 20).unwrap(), Trade::new(1.1, 30).unwrap()]);
/// assert_eq!(stats.accepted, 1);
/// assert_eq!(stats.duplicates, 1);
/// assert_eq!(window.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct TradeWindow {
    trades: VecDeque<Trade>,
    capacity: usize,
    cursor_ms: Option<u64>,
    cursor_prices: Vec<f64>,
    total_accepted: u64,
}

impl TradeWindow {
    /// Creates a window retaining at most `capacity` trades (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            trades: VecDeque::with_capacity(capacity.min(4_096)),
            capacity,
            cursor_ms: None,
            cursor_prices: Vec::new(),
            total_accepted: 0,
        }
    }

    /// Returns the maximum number of trades retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of trades currently retained.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Returns true if no trade is retained.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Timestamp of the newest accepted trade, used as the `since` argument
    /// when fetching more trades.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor_ms
    }

    /// Number of trades accepted over the window's lifetime.
    pub fn total_accepted(&self) -> u64 {
        self.total_accepted
    }

    /// Returns the retained trades, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    /// Appends a batch ordered by timestamp, dropping replays and stale
    /// trades, and evicting the oldest trades beyond capacity.
    pub fn ingest(&mut self, batch: &[Trade]) -> IngestStats {
        let mut stats = IngestStats::default();
        let replay_ms = self.cursor_ms;
        let replay_prices = self.cursor_prices.clone();
        let mut replay_index = 0;

        for &trade in batch {
            let timestamp = trade.timestamp_ms();
            if let Some(cursor) = self.cursor_ms {
                if timestamp < cursor {
                    stats.stale += 1;
                    continue;
                }
            }

            if Some(timestamp) == replay_ms && replay_index < replay_prices.len() {
                let replayed = replay_prices[replay_index] == trade.price();
                replay_index += 1;
                if replayed {
                    stats.duplicates += 1;
                    continue;
                }
            }

            if Some(timestamp) != self.cursor_ms {
                self.cursor_ms = Some(timestamp);
                self.cursor_prices.clear();
            }
            self.cursor_prices.push(trade.price());
            self.trades.push_back(trade);
            self.total_accepted = self.total_accepted.saturating_add(1);
            stats.accepted += 1;
        }

        while self.trades.len() > self.capacity {
            self.trades.pop_front();
        }

        if stats.stale > 0 {
            warn!(
                stale = stats.stale,
                cursor_ms = ?self.cursor_ms,
                "Out-of-order trades dropped"
            );
        }
        if stats.duplicates > 0 {
            debug!(
                accepted = stats.accepted,
                duplicates = stats.duplicates,
                "Replayed trades skipped"
            );
        }
        stats
    }

    /// The most recent trades strictly before `now_ms` that fit `bounds`,
    /// oldest first.
    pub fn recent_before(&self, now_ms: u64, bounds: &WindowConfig) -> Vec<Trade> {
        let end = self.trades.partition_point(|trade| trade.timestamp_ms() < now_ms);
        let cutoff = bounds.cutoff(now_ms);
        let start = self
            .trades
            .partition_point(|trade| trade.timestamp_ms() < cutoff)
            .max(end.saturating_sub(bounds.max_trades));

        if start >= end {
            return Vec::new();
        }
        self.trades.range(start..end).copied().collect()
    }

    /// Drops trades older than `cutoff_ms`.
    pub fn evict_before(&mut self, cutoff_ms: u64) {
        while self
            .trades
            .front()
            .is_some_and(|trade| trade.timestamp_ms() < cutoff_ms)
        {
            self.trades.pop_front();
        }
    }
}
