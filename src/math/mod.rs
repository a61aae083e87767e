// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


/// The arithmetic mean. Returns NaN for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Complementary error function (Abramowitz & Stegun 7.1.26). The maximum
/// absolute error is < 1.5e-7.
pub(crate) fn erfc(x: f64) -> f64 {
    if x < 0.0 {
        return 2.0 - erfc(-x);
    }

    const P: f64 = 0.3275911;
    const A: [f64; 5] = [
        0.254829592,
        -0.284496736,
        1.421413741,
        -1.453152027,
        1.061405429,
    ];

    let t = 1.0 / (1.0 + P * x);
    // Horner's scheme for a1 t + a2 t^2 + ... + a5 t^5.
    let poly = A.iter().rev().fold(0.0, |acc, a| (acc + a) * t);
    poly * (-x * x).exp()
}

/// Get the value below which `quantile` (0 to 1) of the absolute values lie.
/// Linear interpolation is used between ranks. Returns NaN for an empty slice.
pub(crate) fn abs_quantile(values: &[f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    abs.sort_unstable_by(|a, b| a.total_cmp(b));

    let rank = quantile.clamp(0.0, 1.0) * (abs.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    abs[lower] + (abs[upper] - abs[lower]) * frac
}

/// Weighted average of `values`. Infinite weights dominate; if any weight is
/// infinite, the plain mean of the infinitely-weighted values is returned.
pub(crate) fn weighted_average(values: &[f64], weights: &[f64]) -> f64 {
    assert_eq!(values.len(), weights.len());

    let infinite: Vec<f64> = values
        .iter()
        .zip(weights)
        .filter(|(_, w)| w.is_infinite())
        .map(|(&v, _)| v)
        .collect();
    if !infinite.is_empty() {
        return mean(&infinite);
    }

    let (sum, sum_weights) = values
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(sum, sum_weights), (v, w)| {
            (sum + v * w, sum_weights + w)
        });
    sum / sum_weights
}

/// Evaluate the straight line through `(x0, y0)` and `(x1, y1)` at `x`.
/// Extrapolates outside `[x0, x1]`.
#[inline]
pub(crate) fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
