// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Applying gain deltas to science data.
//!
//! If the pre- and post-calibration deltas of a bin agree within their
//! uncertainties, the gain is taken to be stable and a single weighted-average
//! delta is used for every science sample. Otherwise the gain is assumed to
//! drift linearly between the two calibration sequences and each sample is
//! divided by the delta interpolated to its own time.


use ndarray::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use strum_macros::{Display, EnumIter};

use crate::{
    constants::PROBABLE_ERROR_THRESHOLD,
    delta::{DeltaError, GainDelta},
    math::{lerp, weighted_average},
    observation::Channel,
    segment::CalibrationWindow,
};

/// How a bin was calibrated.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalibrationDecision {
    /// Both deltas agree; their inverse-uncertainty-weighted average was
    /// applied uniformly.
    WeightedAverage,

    /// The deltas disagree; the delta was interpolated in time.
    TimeInterpolated,

    /// Only the pre-calibration delta was available.
    PreOnly,

    /// Only the post-calibration delta was available.
    PostOnly,

    /// No usable delta; the bin was left as is.
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Uncalibrated,
}

/// The delta that a bin's science samples are divided by.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedDelta {
    Uniform { value: f64 },

    /// Linear in time through both deltas' (reference time, value) points.
    Interpolated { pre: GainDelta, post: GainDelta },
}

impl AppliedDelta {
    /// The delta at `time` (seconds since the observation's reference epoch).
    pub fn at(&self, time: f64) -> f64 {
        match self {
            AppliedDelta::Uniform { value } => *value,
            AppliedDelta::Interpolated { pre, post } => lerp(
                pre.reference_time,
                pre.value,
                post.reference_time,
                post.value,
                time,
            ),
        }
    }
}

/// The outcome of calibrating one bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinCalibration {
    pub decision: CalibrationDecision,

    /// The significance of the pre/post difference, if both were available.
    pub z: Option<f64>,

    /// `None` if the bin was left uncalibrated.
    pub applied: Option<AppliedDelta>,
}

impl BinCalibration {
    fn uncalibrated(z: Option<f64>) -> BinCalibration {
        BinCalibration {
            decision: CalibrationDecision::Uncalibrated,
            z,
            applied: None,
        }
    }
}

/// Decide how a bin with the given deltas should be calibrated.
pub fn decide(pre: Option<&GainDelta>, post: Option<&GainDelta>) -> BinCalibration {
    match (pre, post) {
        (Some(pre), Some(post)) => {
            let z = (pre.value - post.value).abs()
                / (pre.uncertainty.powi(2) + post.uncertainty.powi(2)).sqrt();
            let average = || AppliedDelta::Uniform {
                value: weighted_average(
                    &[pre.value, post.value],
                    &[1.0 / pre.uncertainty, 1.0 / post.uncertainty],
                ),
            };

            // A NaN z (identical deltas with zero uncertainties) also ends up
            // interpolated.
            let (decision, applied) = if z < PROBABLE_ERROR_THRESHOLD {
                (CalibrationDecision::WeightedAverage, average())
            } else if pre.reference_time == post.reference_time {
                // There's no time baseline to interpolate over.
                (CalibrationDecision::WeightedAverage, average())
            } else {
                (
                    CalibrationDecision::TimeInterpolated,
                    AppliedDelta::Interpolated {
                        pre: *pre,
                        post: *post,
                    },
                )
            };
            BinCalibration {
                decision,
                z: Some(z),
                applied: Some(applied),
            }
        }

        (Some(pre), None) => BinCalibration {
            decision: CalibrationDecision::PreOnly,
            z: None,
            applied: Some(AppliedDelta::Uniform { value: pre.value }),
        },

        (None, Some(post)) => BinCalibration {
            decision: CalibrationDecision::PostOnly,
            z: None,
            applied: Some(AppliedDelta::Uniform { value: post.value }),
        },

        (None, None) => BinCalibration::uncalibrated(None),
    }
}

/// Divide the science samples of `channel` by the deltas, bin by bin.
/// Diode-on samples are never touched, and a bin whose delta would be zero,
/// negative or non-finite for any science sample is left as is and reported
/// as uncalibrated.
///
/// `pre` and `post` must have one entry per bin.
pub fn apply_deltas(
    channel: &mut Channel,
    window: &CalibrationWindow,
    pre: &[Result<GainDelta, DeltaError>],
    post: &[Result<GainDelta, DeltaError>],
) -> Vec<BinCalibration> {
    assert_eq!(pre.len(), channel.num_bins());
    assert_eq!(post.len(), channel.num_bins());

    let science: Vec<(usize, f64)> = window
        .science_range(channel.len())
        .filter(|&i| !channel.samples[i].calstate)
        .map(|i| (i, channel.samples[i].time))
        .collect();

    channel
        .data
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(pre.par_iter().zip(post.par_iter()))
        .map(|(mut column, (pre, post))| {
            let cal = decide(pre.as_ref().ok(), post.as_ref().ok());
            let applied = match cal.applied {
                Some(applied) => applied,
                None => return cal,
            };

            let deltas: Vec<f64> = science.iter().map(|&(_, t)| applied.at(t)).collect();
            if deltas.iter().any(|d| !d.is_finite() || *d <= 0.0) {
                return BinCalibration::uncalibrated(cal.z);
            }
            for (&(i, _), delta) in science.iter().zip(deltas) {
                column[i] /= delta;
            }
            cal
        })
        .collect()
}
