// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-channel and per-bin records of what calibration did.

use indexmap::IndexMap;
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::Display;

use crate::{
    apply::{AppliedDelta, BinCalibration, CalibrationDecision},
    delta::{DeltaError, GainDelta},
    observation::ChannelId,
    segment::CalibrationWindow,
};

use super::ChannelError;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Both calibration sides contributed.
    Calibrated,

    /// Calibrated, but only with post-calibration deltas.
    PreCalibrationUnavailable,

    /// Calibrated, but only with pre-calibration deltas.
    PostCalibrationUnavailable,

    /// A window was found, but no bin could be calibrated.
    Uncalibrated,

    /// The channel couldn't be processed; see the error.
    Failed,

    /// The channel's feed wasn't selected.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinReport {
    pub bin: usize,
    pub decision: CalibrationDecision,
    pub z: Option<f64>,
    pub applied: Option<AppliedDelta>,
    pub pre: Option<GainDelta>,
    pub post: Option<GainDelta>,

    /// Why the pre-calibration delta is missing, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_error: Option<String>,
}

impl BinReport {
    pub(super) fn new(
        bin: usize,
        cal: BinCalibration,
        pre: &Result<GainDelta, DeltaError>,
        post: &Result<GainDelta, DeltaError>,
    ) -> BinReport {
        BinReport {
            bin,
            decision: cal.decision,
            z: cal.z,
            applied: cal.applied,
            pre: pre.as_ref().ok().copied(),
            post: post.as_ref().ok().copied(),
            pre_error: pre.as_ref().err().map(|e| e.to_string()),
            post_error: post.as_ref().err().map(|e| e.to_string()),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.decision != CalibrationDecision::Uncalibrated
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    #[serde(flatten)]
    pub id: ChannelId,
    pub status: ChannelStatus,
    pub window: Option<CalibrationWindow>,

    /// Was the window read from the observation's metadata rather than found?
    pub window_reused: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The number of frequency bins in the channel, whether or not it got as
    /// far as the applier.
    pub num_bins: usize,

    pub bins: Vec<BinReport>,
}

impl ChannelReport {
    pub(super) fn skipped(id: ChannelId) -> ChannelReport {
        ChannelReport {
            id,
            status: ChannelStatus::Skipped,
            window: None,
            window_reused: false,
            error: None,
            num_bins: 0,
            bins: vec![],
        }
    }

    pub(super) fn failed(error: &ChannelError, num_bins: usize) -> ChannelReport {
        ChannelReport {
            id: error.channel_id(),
            status: ChannelStatus::Failed,
            window: None,
            window_reused: false,
            error: Some(error.to_string()),
            num_bins,
            bins: vec![],
        }
    }

    pub fn num_calibrated_bins(&self) -> usize {
        self.bins.iter().filter(|b| b.is_calibrated()).count()
    }
}

/// Everything that happened while calibrating an observation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CalibrationReport {
    pub channels: Vec<ChannelReport>,
}

impl CalibrationReport {
    pub fn channel(&self, id: ChannelId) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Channels that weren't skipped.
    pub fn num_processed_channels(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.status != ChannelStatus::Skipped)
            .count()
    }

    /// Channels with at least one calibrated bin.
    pub fn num_calibrated_channels(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.num_calibrated_bins() > 0)
            .count()
    }

    /// (calibrated bins, total bins) over all processed channels. The bins of
    /// failed channels count towards the total.
    pub fn bin_coverage(&self) -> (usize, usize) {
        self.channels
            .iter()
            .filter(|c| c.status != ChannelStatus::Skipped)
            .fold((0, 0), |(cal, total), c| {
                (cal + c.num_calibrated_bins(), total + c.num_bins)
            })
    }

    /// How many bins got each decision. Every decision is present, in
    /// declaration order.
    pub fn decision_counts(&self) -> IndexMap<CalibrationDecision, usize> {
        let mut counts: IndexMap<CalibrationDecision, usize> =
            CalibrationDecision::iter().map(|d| (d, 0)).collect();
        for bin in self.channels.iter().flat_map(|c| &c.bins) {
            *counts.entry(bin.decision).or_default() += 1;
        }
        counts
    }

    pub fn status_counts(&self) -> IndexMap<ChannelStatus, usize> {
        let mut counts = IndexMap::new();
        for c in &self.channels {
            *counts.entry(c.status).or_default() += 1;
        }
        counts
    }
}
