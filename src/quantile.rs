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
//! Exact order-statistic quantiles over a bounded window.
//!
//! One interpolation convention is used throughout: for `n` sorted values
//! and percentile `z`, the fractional rank is `h = (n - 1) * z / 100` and
//! the result interpolates linearly between `x[floor(h)]` and
//! `x[floor(h) + 1]`. `z = 0` yields the minimum and `z = 100` the maximum.

use crate::error::{FloorPriceError, Result};

/// Returns the value at percentile `z` (in `[0, 100]`) of `values`.
///
/// The input does not need to be sorted. Non-finite values are ignored.
///
/// # Errors
/// Returns [`FloorPriceError::InvalidParameter`] for `z` outside `[0, 100]`
/// and [`FloorPriceError::EmptyWindow`] when no finite value remains.
///
/// # Example
/// ```rust
/// use floorprice::quantile::percentile;
///
/// let prices = [4.0, 1.0, 3.0, 2.0, 5.0];
/// assert_eq!(percentile(&prices, 50.0).unwrap(), 3.0);
/// assert_eq!(percentile(&prices, 10.0).unwrap(), 1.4);
/// ```
pub fn percentile(values: &[f64], z: f64) -> Result<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_unstable_by(f64::total_cmp);
    percentile_sorted(&sorted, z)
}

/// Same as [`percentile`] for input already sorted ascending and finite.
///
/// # Errors
/// See [`percentile`].
pub fn percentile_sorted(sorted: &[f64], z: f64) -> Result<f64> {
    if !z.is_finite() || !(0.0..=100.0).contains(&z) {
        return Err(FloorPriceError::InvalidParameter(
            "percentile must be finite and in [0, 100]",
        ));
    }
    if sorted.is_empty() {
        return Err(FloorPriceError::EmptyWindow);
    }

    let rank = (sorted.len() - 1) as f64 * z / 100.0;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
}

/// Median of already sorted values, averaging the middle pair for even
/// lengths. Returns `None` for an empty slice.
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let len = sorted.len();
    if len == 0 {
        return None;
    }

    let mid = len / 2;
    if len % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) * 0.5)
    }
}
