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
//! Error taxonomy shared by every component.
//!
//! Every per-cycle condition is recoverable: a predictor reports it in its
//! cycle report and carries on. Only [`FloorPriceError::Configuration`] is
//! raised at construction time, and [`FloorPriceError::Collaborator`] is
//! surfaced untouched so the caller decides its own retry policy.

use thiserror::Error;

/// Boxed error returned by external collaborators (trade sources, state
/// stores, estimate sinks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FloorPriceError>;

/// Errors and per-cycle outcomes produced by the estimator.
#[derive(Debug, Error)]
pub enum FloorPriceError {
    /// The window holds fewer trades than needed to filter or estimate.
    #[error("insufficient data: {available} trades available, {required} required")]
    InsufficientData { required: usize, available: usize },

    /// The backtest window holds too few trades governed by an estimate.
    #[error("insufficient backtest sample: {available} trades governed, {required} required")]
    InsufficientBacktestSample { required: usize, available: usize },

    /// A quantile was requested over an empty set of prices.
    #[error("quantile is undefined for an empty window")]
    EmptyWindow,

    /// A function argument is outside its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Static misconfiguration detected when building a component.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A trade record failed validation.
    #[error("invalid trade: {0}")]
    InvalidTrade(String),

    /// An external collaborator call failed.
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: &'static str,
        #[source]
        source: BoxError,
    },
}

impl FloorPriceError {
    /// Returns `true` for conditions that resolve themselves once more
    /// trades arrive.
    pub fn is_insufficient(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::InsufficientBacktestSample { .. }
                | Self::EmptyWindow
        )
    }
}
