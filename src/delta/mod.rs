// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gain deltas: the difference between the diode-on and diode-off power of a
//! calibration sequence, per frequency bin.
//!
//! The diode adds a known amount of power, so the size of the on/off step is
//! proportional to the receiver gain at the time of the sequence. Each side of
//! the science window (pre and post) gets its own set of deltas. Both the
//! diode-on and diode-off sweeps drift, so straight lines are fit to each
//! against time and the step is measured at a single reference time.

mod error;

pub use error::DeltaError;

use std::{num::NonZeroUsize, ops::Range};

use log::trace;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use strum_macros::{Display, EnumIter};

use crate::{
    constants::MIN_FIT_POINTS,
    fitting::{FitResult, LinearFitter},
    math::mean,
    observation::Channel,
    segment::CalibrationWindow,
};

/// Which calibration sequence, relative to the science data.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Pre,
    Post,
}

/// The diode-on minus diode-off power of one side's calibration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GainDelta {
    pub value: f64,

    /// The 1σ uncertainty of `value`, propagated from the fit parameters.
    pub uncertainty: f64,

    /// The time (seconds since the observation's reference epoch) at which
    /// the delta was measured.
    pub reference_time: f64,
}

/// Estimates the [`GainDelta`]s of a channel.
pub struct DeltaEstimator<'a> {
    pub fitter: &'a dyn LinearFitter,

    /// Adjacent bins are averaged together in blocks of this size before
    /// fitting. Every bin in a block shares the block's delta.
    pub bins_per_block: NonZeroUsize,

    /// If non-zero, each delta is replaced with the mean of the available
    /// deltas within this many bins of it.
    pub smoothing_window: usize,
}

impl<'a> DeltaEstimator<'a> {
    /// A per-bin estimator without any smoothing.
    pub fn new(fitter: &'a dyn LinearFitter) -> DeltaEstimator<'a> {
        DeltaEstimator {
            fitter,
            bins_per_block: NonZeroUsize::MIN,
            smoothing_window: 0,
        }
    }

    /// Get the deltas of one side of a channel, one result per bin.
    pub fn estimate(
        &self,
        channel: &Channel,
        window: &CalibrationWindow,
        side: Side,
    ) -> Vec<Result<GainDelta, DeltaError>> {
        let num_bins = channel.num_bins();
        let range = match side {
            Side::Pre => window.pre_range(),
            Side::Post => window.post_range(channel.len()),
        };
        let (on, off) = partition_calibration(channel, range);
        if on.len() < MIN_FIT_POINTS || off.len() < MIN_FIT_POINTS {
            trace!(
                "{}: {side}-calibration has {} on and {} off samples",
                channel.id,
                on.len(),
                off.len()
            );
            let e = DeltaError::InsufficientCalibrationData {
                side,
                num_on: on.len(),
                num_off: off.len(),
            };
            return vec![Err(e); num_bins];
        }

        let on_times: Vec<f64> = on.iter().map(|&i| channel.samples[i].time).collect();
        let off_times: Vec<f64> = off.iter().map(|&i| channel.samples[i].time).collect();
        let reference_time = reference_time(&on_times, &off_times);

        let bins_per_block = self.bins_per_block.get();
        let num_blocks = (num_bins + bins_per_block - 1) / bins_per_block;
        let block_deltas: Vec<Result<GainDelta, DeltaError>> = (0..num_blocks)
            .into_par_iter()
            .map(|i_block| {
                let bins = i_block * bins_per_block..((i_block + 1) * bins_per_block).min(num_bins);
                let fit = |indices: &[usize], times: &[f64]| {
                    let (x, y) = block_series(channel.data.view(), indices, times, bins.clone());
                    self.fitter
                        .fit(&x, &y)
                        .map_err(|source| DeltaError::NumericalFitFailure { side, source })
                };
                let on_fit = fit(&on, &on_times)?;
                let off_fit = fit(&off, &off_times)?;
                Ok(delta_from_fits(&on_fit, &off_fit, reference_time))
            })
            .collect();

        let deltas = (0..num_bins)
            .map(|bin| block_deltas[bin / bins_per_block].clone())
            .collect::<Vec<_>>();
        if self.smoothing_window > 0 {
            smooth(&deltas, self.smoothing_window)
        } else {
            deltas
        }
    }
}

/// Get the diode-on and diode-off calibration sample indices within `range`.
fn partition_calibration(channel: &Channel, range: Range<usize>) -> (Vec<usize>, Vec<usize>) {
    let mut on = vec![];
    let mut off = vec![];
    for i in range {
        let sample = &channel.samples[i];
        if sample.is_cal_on() {
            on.push(i);
        } else if sample.is_cal_off() {
            off.push(i);
        }
    }
    (on, off)
}

/// The block-averaged intensity of each sample against its time. Samples with
/// non-finite intensities are dropped.
fn block_series(
    data: ArrayView2<f64>,
    indices: &[usize],
    times: &[f64],
    bins: Range<usize>,
) -> (Vec<f64>, Vec<f64>) {
    indices
        .iter()
        .zip(times.iter())
        .filter_map(|(&i, &t)| {
            let v = data.slice(s![i, bins.clone()]).mean()?;
            v.is_finite().then_some((t, v))
        })
        .unzip()
}

/// The time at which the on/off step is measured: the mean of the mean on and
/// mean off times, clamped to lie between the midpoints of the outermost on
/// and off samples.
pub(crate) fn reference_time(on_times: &[f64], off_times: &[f64]) -> f64 {
    let t = (mean(on_times) + mean(off_times)) / 2.0;
    let (on_first, on_last) = (on_times[0], on_times[on_times.len() - 1]);
    let (off_first, off_last) = (off_times[0], off_times[off_times.len() - 1]);
    let a = (on_first + off_last) / 2.0;
    let b = (on_last + off_first) / 2.0;
    t.clamp(a.min(b), a.max(b))
}

fn delta_from_fits(on: &FitResult, off: &FitResult, reference_time: f64) -> GainDelta {
    let t = reference_time;
    GainDelta {
        value: (on.evaluate(t) - off.evaluate(t)).abs(),
        uncertainty: (on.intercept_sd.powi(2)
            + off.intercept_sd.powi(2)
            + (on.slope_sd * t).powi(2)
            + (off.slope_sd * t).powi(2))
        .sqrt(),
        reference_time,
    }
}

/// Replace every available delta with the mean of the available deltas within
/// `window` bins of it.
fn smooth(
    deltas: &[Result<GainDelta, DeltaError>],
    window: usize,
) -> Vec<Result<GainDelta, DeltaError>> {
    deltas
        .iter()
        .enumerate()
        .map(|(bin, delta)| {
            let delta = delta.as_ref().map_err(Clone::clone)?;
            let lo = bin.saturating_sub(window);
            let hi = (bin + window + 1).min(deltas.len());
            let neighbours: Vec<&GainDelta> =
                deltas[lo..hi].iter().filter_map(|d| d.as_ref().ok()).collect();
            let n = neighbours.len() as f64;
            Ok(GainDelta {
                value: neighbours.iter().map(|d| d.value).sum::<f64>() / n,
                uncertainty: neighbours.iter().map(|d| d.uncertainty).sum::<f64>() / n,
                reference_time: delta.reference_time,
            })
        })
        .collect()
}
