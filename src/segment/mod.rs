// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Locating the calibration and science portions of a channel's samples.
//!
//! An observation is laid out as a pre-calibration noise-diode sequence, the
//! science integration, then a post-calibration sequence. The flags are noisy
//! (short invalid-sweep blips happen mid-science, and on/off observations have
//! a transition in the middle), so the boundaries are found with a small
//! forward-scanning state machine.

#[cfg(test)]
mod tests;

use std::ops::Range;

use itertools::Itertools;
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::{DEFAULT_MIN_SCIENCE_SAMPLES, ONOFF_OBS_MODE, ONOFF_OFF_MARKER},
    observation::Sample,
};

/// Sample indices (into a channel) delimiting the science data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationWindow {
    /// The first science sample. Everything before it is pre-calibration.
    pub data_start: usize,

    /// The first post-calibration sample. If this couldn't be found, the
    /// science data runs to the end of the channel.
    pub post_cal_start: Option<usize>,

    /// The first sample of the "off" pointing of an on/off observation.
    pub off_transition: Option<usize>,
}

impl CalibrationWindow {
    /// The samples used for pre-calibration.
    pub fn pre_range(&self) -> Range<usize> {
        0..self.data_start
    }

    /// The samples that get calibrated.
    pub fn science_range(&self, num_samples: usize) -> Range<usize> {
        self.data_start..self.post_cal_start.unwrap_or(num_samples).min(num_samples)
    }

    /// The samples used for post-calibration.
    pub fn post_range(&self, num_samples: usize) -> Range<usize> {
        self.post_cal_start.unwrap_or(num_samples).min(num_samples)..num_samples
    }

    /// The window boundaries in the order downstream tools expect them:
    /// `[data_start, post_cal_start]`, or for on/off observations,
    /// `[data_start, off_transition - 1, off_transition, post_cal_start]`.
    pub fn boundaries(&self) -> Vec<Option<usize>> {
        match self.off_transition {
            None => vec![Some(self.data_start), self.post_cal_start],
            Some(off) => vec![
                Some(self.data_start),
                off.checked_sub(1),
                Some(off),
                self.post_cal_start,
            ],
        }
    }

    /// Render the boundaries as a comma-separated string (missing values are
    /// "None").
    pub fn to_metadata_string(&self) -> String {
        self.boundaries()
            .into_iter()
            .map(|b| match b {
                Some(i) => i.to_string(),
                None => "None".to_string(),
            })
            .join(",")
    }

    /// Parse a string written by [`CalibrationWindow::to_metadata_string`].
    pub fn from_metadata_str(s: &str) -> Result<CalibrationWindow, WindowMetadataError> {
        let values = s
            .split(',')
            .map(|v| match v.trim() {
                "None" => Ok(None),
                v => v
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| WindowMetadataError::Value(v.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (data_start, post_cal_start, off_transition) = match values.as_slice() {
            [data_start, post] => (*data_start, *post, None),
            [data_start, _, off, post] => (*data_start, *post, *off),
            _ => return Err(WindowMetadataError::Count(values.len())),
        };
        let data_start = data_start.ok_or(WindowMetadataError::NoDataStart)?;
        if let Some(post) = post_cal_start {
            if post <= data_start {
                return Err(WindowMetadataError::Order { data_start, post });
            }
        }

        Ok(CalibrationWindow {
            data_start,
            post_cal_start,
            off_transition,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Couldn't find the start of the science data")]
    NoDataStart,

    #[error("This is an on/off observation, but no sample has the '{ONOFF_OFF_MARKER}' marker")]
    MissingOnOffMarker,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowMetadataError {
    #[error("Stored calibration window has an invalid index '{0}'")]
    Value(String),

    #[error("Stored calibration window has {0} indices; expected 2 or 4")]
    Count(usize),

    #[error("Stored calibration window has no science start index")]
    NoDataStart,

    #[error("Stored calibration window's post-calibration start ({post}) isn't after the science start ({data_start})")]
    Order { data_start: usize, post: usize },
}

/// Finds [`CalibrationWindow`]s.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    /// A run of this many (or fewer) science samples followed by an invalid
    /// sweep is considered spurious, and the search for the science start
    /// resumes.
    pub min_science_samples: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            min_science_samples: DEFAULT_MIN_SCIENCE_SAMPLES,
        }
    }
}

impl Segmenter {
    /// Find the calibration window of a single channel's samples.
    pub fn find_window(
        &self,
        samples: &[Sample],
        obs_mode: &str,
    ) -> Result<CalibrationWindow, SegmentError> {
        let (data_start, post_cal_start) = match self.scan(samples) {
            (Some(data_start), post) => (data_start, post),
            (None, _) => {
                trace!("No calibration-bracketed science start found; using fallback");
                fallback(samples).ok_or(SegmentError::NoDataStart)?
            }
        };

        let off_transition = if is_onoff(obs_mode) {
            let marker = normalise_mode(ONOFF_OFF_MARKER);
            let off = samples
                .iter()
                .position(|s| normalise_mode(&s.mode).contains(&marker))
                .ok_or(SegmentError::MissingOnOffMarker)?;
            Some(off)
        } else {
            None
        };

        Ok(CalibrationWindow {
            data_start,
            post_cal_start,
            off_transition,
        })
    }

    /// The forward pass. Returns the science start and the post-calibration
    /// start, if found.
    fn scan(&self, samples: &[Sample]) -> (Option<usize>, Option<usize>) {
        let mut cal_started = false;
        let mut pre_cal_complete = false;
        let mut data_start = None;
        let mut post_cal_start = None;
        let mut num_science = 0;

        for (i, sample) in samples.iter().enumerate() {
            if sample.calstate {
                cal_started = true;
            }

            if cal_started && sample.is_science() && !pre_cal_complete {
                data_start = Some(i);
                pre_cal_complete = true;
            }

            // Two contiguous invalid sweeps are a post-calibration candidate;
            // anything else resets it, so a lone blip doesn't end the science.
            if i > 0 && pre_cal_complete && !sample.swpvalid && !samples[i - 1].swpvalid {
                if post_cal_start.is_none() {
                    post_cal_start = Some(i - 1);
                }
            } else {
                post_cal_start = None;
            }

            if pre_cal_complete && sample.is_science() {
                num_science += 1;
            }

            if data_start.is_some() && !sample.swpvalid && num_science <= self.min_science_samples
            {
                trace!("Spurious science start at {data_start:?} (only {num_science} samples)");
                data_start = None;
                pre_cal_complete = false;
                post_cal_start = None;
                num_science = 0;
            }

            // A new diode spike after the science; we're done.
            if pre_cal_complete && !sample.swpvalid && sample.calstate {
                if post_cal_start.is_none() {
                    post_cal_start = Some(i);
                }
                break;
            }
        }

        (data_start, post_cal_start)
    }
}

/// Without a calibration-bracketed start, use the first valid sweep as the
/// science start, and the next invalid sweep as the post-calibration start.
fn fallback(samples: &[Sample]) -> Option<(usize, Option<usize>)> {
    let data_start = samples.iter().position(|s| s.swpvalid)?;
    let post = samples[data_start..]
        .iter()
        .position(|s| !s.swpvalid)
        .map(|i| i + data_start);
    Some((data_start, post))
}

fn normalise_mode(mode: &str) -> String {
    mode.trim().to_lowercase().replace('-', "")
}

/// Is this observing mode an on/off observation?
pub fn is_onoff(obs_mode: &str) -> bool {
    normalise_mode(obs_mode) == ONOFF_OBS_MODE
}
