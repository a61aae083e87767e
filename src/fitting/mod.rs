// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Linear fitting of calibration sweeps.
//!
//! Every calibration-side fit goes through the [`LinearFitter`] trait. The
//! default backend is [`RobustChauvenetFitter`], an iterative least-squares
//! fit that rejects outliers with Chauvenet's criterion against a robust
//! (68.27th percentile) estimate of the scatter. [`OrdinaryLeastSquares`]
//! never rejects anything.

mod error;

pub use error::FitError;

use std::f64::consts::SQRT_2;

use log::trace;

use crate::{
    constants::{
        DEFAULT_CHAUVENET_CRITERION, DEFAULT_MAX_REJECTION_ITERATIONS, MIN_FIT_POINTS,
        ONE_SIGMA_QUANTILE,
    },
    math::{abs_quantile, erfc, mean},
};

/// The result of a straight-line fit `y = intercept + slope * (x - x_offset)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub intercept: f64,
    pub slope: f64,
    pub intercept_sd: f64,
    pub slope_sd: f64,

    /// The mean of all supplied x values. The fit was done on x values with
    /// this subtracted, so the intercept is the model's value here.
    pub x_offset: f64,

    /// The number of points that survived outlier rejection.
    pub num_used: usize,
}

impl FitResult {
    /// Evaluate the fitted line at `x` (in the same units as the original,
    /// uncentred x values).
    pub fn evaluate(&self, x: f64) -> f64 {
        self.intercept + self.slope * (x - self.x_offset)
    }
}

/// Something that can fit a straight line to `(x, y)` pairs.
pub trait LinearFitter: Send + Sync {
    fn fit(&self, x: &[f64], y: &[f64]) -> Result<FitResult, FitError>;
}

/// Plain least squares. Useful as a reference and when the data are known to
/// be free of outliers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinaryLeastSquares;

impl LinearFitter for OrdinaryLeastSquares {
    fn fit(&self, x: &[f64], y: &[f64]) -> Result<FitResult, FitError> {
        let (x_offset, xc) = centre(x, y)?;
        let keep: Vec<usize> = (0..xc.len()).collect();
        let (intercept, slope) = least_squares(&xc, y, &keep)?;
        Ok(finish(&xc, y, &keep, intercept, slope, x_offset))
    }
}

/// Least squares with iterative Chauvenet rejection.
///
/// Each pass computes the residuals against the current model, estimates the
/// scatter as the 68.27th percentile of the absolute residuals, and rejects
/// every point for which `n * erfc(|r| / (σ√2)) < criterion`. The survivors
/// are refit and the process repeats until nothing more is rejected.
/// A pass that would leave fewer than [`MIN_FIT_POINTS`] points fails the fit
/// with [`FitError::InsufficientData`].
#[derive(Debug, Clone, Copy)]
pub struct RobustChauvenetFitter {
    pub criterion: f64,
    pub max_iterations: usize,
}

impl Default for RobustChauvenetFitter {
    fn default() -> Self {
        Self {
            criterion: DEFAULT_CHAUVENET_CRITERION,
            max_iterations: DEFAULT_MAX_REJECTION_ITERATIONS,
        }
    }
}

impl LinearFitter for RobustChauvenetFitter {
    fn fit(&self, x: &[f64], y: &[f64]) -> Result<FitResult, FitError> {
        let (x_offset, xc) = centre(x, y)?;
        let mut keep: Vec<usize> = (0..xc.len()).collect();
        let (mut intercept, mut slope) = least_squares(&xc, y, &keep)?;

        // A scatter this small relative to the data means the fit is exact
        // to within rounding.
        let y_scale = 1.0 + y.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

        for iteration in 0..self.max_iterations {
            if keep.len() <= MIN_FIT_POINTS {
                break;
            }

            let residuals: Vec<f64> = keep
                .iter()
                .map(|&i| y[i] - (intercept + slope * xc[i]))
                .collect();
            let sigma = abs_quantile(&residuals, ONE_SIGMA_QUANTILE);
            if !(sigma > 1e-12 * y_scale) {
                break;
            }

            let n = keep.len() as f64;
            let survivors: Vec<usize> = keep
                .iter()
                .zip(residuals.iter())
                .filter(|(_, r)| n * erfc(r.abs() / (sigma * SQRT_2)) >= self.criterion)
                .map(|(&i, _)| i)
                .collect();
            if survivors.len() == keep.len() {
                break;
            }
            if survivors.len() < MIN_FIT_POINTS {
                trace!(
                    "Rejection pass {iteration} left {} of {} points",
                    survivors.len(),
                    keep.len()
                );
                return Err(FitError::InsufficientData {
                    available: survivors.len(),
                });
            }

            trace!(
                "Rejection pass {iteration}: rejected {} of {} points",
                keep.len() - survivors.len(),
                keep.len()
            );
            keep = survivors;
            (intercept, slope) = least_squares(&xc, y, &keep)?;
        }

        Ok(finish(&xc, y, &keep, intercept, slope, x_offset))
    }
}

/// Validate the inputs and centre x on its mean. Returns the mean and the
/// centred x values.
fn centre(x: &[f64], y: &[f64]) -> Result<(f64, Vec<f64>), FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < MIN_FIT_POINTS {
        return Err(FitError::InsufficientData {
            available: x.len(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::Singular);
    }

    let x_offset = mean(x);
    Ok((x_offset, x.iter().map(|v| v - x_offset).collect()))
}

/// Least-squares (intercept, slope) using only the points in `keep`.
fn least_squares(x: &[f64], y: &[f64], keep: &[usize]) -> Result<(f64, f64), FitError> {
    let n = keep.len() as f64;
    let x_mean = keep.iter().map(|&i| x[i]).sum::<f64>() / n;
    let y_mean = keep.iter().map(|&i| y[i]).sum::<f64>() / n;
    let (sxy, sxx) = keep.iter().fold((0.0, 0.0), |(sxy, sxx), &i| {
        let dx = x[i] - x_mean;
        (sxy + dx * (y[i] - y_mean), sxx + dx * dx)
    });
    if !(sxx > 0.0) {
        return Err(FitError::Singular);
    }

    let slope = sxy / sxx;
    Ok((y_mean - slope * x_mean, slope))
}

/// Compute the parameter uncertainties of the final fit.
fn finish(
    x: &[f64],
    y: &[f64],
    keep: &[usize],
    intercept: f64,
    slope: f64,
    x_offset: f64,
) -> FitResult {
    let n = keep.len() as f64;
    let x_mean = keep.iter().map(|&i| x[i]).sum::<f64>() / n;
    let sxx = keep.iter().map(|&i| (x[i] - x_mean).powi(2)).sum::<f64>();
    let ssr = keep
        .iter()
        .map(|&i| (y[i] - slope * x[i] - intercept).powi(2))
        .sum::<f64>();

    let sigma2 = ssr / (n - 2.0);
    FitResult {
        intercept,
        slope,
        intercept_sd: (sigma2 * (1.0 / n + x_mean.powi(2) / sxx)).sqrt(),
        slope_sd: (sigma2 / sxx).sqrt(),
        x_offset,
        num_used: keep.len(),
    }
}
