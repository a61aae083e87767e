// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Observation data: samples, channels and the [`SampleTable`] trait that the
//! calibration code uses to access an observation without knowing how it's
//! stored.


use std::fmt::Display;

use hifitime::Epoch;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::WINDOW_METADATA_PREFIX;

/// A receiver signal path, identified by its feed (IFNUM) and polarisation
/// (PLNUM).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChannelId {
    pub feed: u16,
    pub pol: u16,
}

impl ChannelId {
    /// The observation-metadata key that this channel's calibration window is
    /// stored under.
    pub fn window_metadata_key(self) -> String {
        format!("{WINDOW_METADATA_PREFIX}_F{}_P{}", self.feed, self.pol)
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "feed {} pol {}", self.feed, self.pol)
    }
}

/// The metadata of one time-ordered observation row. The intensities are kept
/// separately (see [`SampleTable::intensities`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds since the observation's reference epoch.
    pub time: f64,

    /// Is the calibration noise diode on (CALSTATE = 1)?
    pub calstate: bool,

    /// The SWPVALID flag. Science data is recorded with SWPVALID = 1;
    /// calibration sweeps have SWPVALID = 0.
    pub swpvalid: bool,

    pub feed: u16,
    pub pol: u16,

    /// The observing mode of this row, e.g. "onoff:on".
    pub mode: String,
}

impl Sample {
    pub fn channel_id(&self) -> ChannelId {
        ChannelId {
            feed: self.feed,
            pol: self.pol,
        }
    }

    /// Science data: diode off and a valid sweep.
    pub fn is_science(&self) -> bool {
        !self.calstate && self.swpvalid
    }

    /// A calibration sweep with the diode on.
    pub fn is_cal_on(&self) -> bool {
        self.calstate && !self.swpvalid
    }

    /// A calibration sweep with the diode off.
    pub fn is_cal_off(&self) -> bool {
        !self.calstate && !self.swpvalid
    }
}

/// Read/write access to an observation's samples. The calibration code only
/// ever talks to an observation through this trait.
pub trait SampleTable {
    fn num_samples(&self) -> usize;

    /// The number of frequency bins in every intensity vector.
    fn num_bins(&self) -> usize;

    /// The observation-wide observing mode (e.g. "onoff").
    fn obs_mode(&self) -> &str;

    fn sample(&self, index: usize) -> Sample;

    fn intensities(&self, index: usize) -> ArrayView1<'_, f64>;

    fn intensities_mut(&mut self, index: usize) -> ArrayViewMut1<'_, f64>;

    fn metadata(&self, key: &str) -> Option<&str>;

    fn set_metadata(&mut self, key: String, value: String);

    /// All distinct channels in the table, sorted by feed then polarisation.
    fn channel_ids(&self) -> Vec<ChannelId> {
        (0..self.num_samples())
            .map(|i| self.sample(i).channel_id())
            .unique()
            .sorted()
            .collect()
    }

    /// Copy out all of the samples belonging to a channel, in table order.
    fn extract_channel(&self, id: ChannelId) -> Channel {
        let (rows, samples): (Vec<usize>, Vec<Sample>) = (0..self.num_samples())
            .map(|i| (i, self.sample(i)))
            .filter(|(_, s)| s.channel_id() == id)
            .unzip();
        let mut data = Array2::zeros((rows.len(), self.num_bins()));
        for (mut dst, &row) in data.outer_iter_mut().zip(rows.iter()) {
            dst.assign(&self.intensities(row));
        }
        Channel {
            id,
            rows,
            samples,
            data,
        }
    }

    /// Copy a channel's intensities back into the table.
    fn write_back(&mut self, channel: &Channel) {
        for (src, &row) in channel.data.outer_iter().zip(channel.rows.iter()) {
            self.intensities_mut(row).assign(&src);
        }
    }
}

/// All of the samples sharing one (feed, polarisation) pair, in time order.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,

    /// The table row of each sample.
    pub rows: Vec<usize>,

    pub samples: Vec<Sample>,

    /// Intensities. The first dimension is sample, the second is frequency
    /// bin.
    pub data: Array2<f64>,
}

impl Channel {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_bins(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Returns the first sample index at which time goes backwards, if any.
    pub fn first_non_monotonic(&self) -> Option<usize> {
        self.samples
            .windows(2)
            .position(|w| w[1].time < w[0].time)
            .map(|i| i + 1)
    }
}

/// An in-memory observation.
#[derive(Debug, Clone)]
pub struct Observation {
    /// The reference epoch that sample times are relative to.
    pub date: Epoch,

    pub obs_mode: String,

    /// Header-like key/value metadata. Insertion order is preserved.
    pub metadata: IndexMap<String, String>,

    pub samples: Vec<Sample>,

    /// Intensities. The first dimension is sample, the second is frequency
    /// bin.
    pub data: Array2<f64>,
}

impl SampleTable for Observation {
    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn num_bins(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    fn obs_mode(&self) -> &str {
        &self.obs_mode
    }

    fn sample(&self, index: usize) -> Sample {
        self.samples[index].clone()
    }

    fn intensities(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.row(index)
    }

    fn intensities_mut(&mut self, index: usize) -> ArrayViewMut1<'_, f64> {
        self.data.row_mut(index)
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    fn set_metadata(&mut self, key: String, value: String) {
        self.metadata.insert(key, value);
    }
}
