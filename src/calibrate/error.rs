// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that stop a single channel from being calibrated. None of these
//! are fatal to the observation as a whole.

use thiserror::Error;

use crate::{
    observation::ChannelId,
    segment::{SegmentError, WindowMetadataError},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("{id}: Couldn't find the start of the science data")]
    SegmentationFailure { id: ChannelId },

    #[error("{id}: {source}")]
    MalformedObservation {
        id: ChannelId,
        source: MalformedObservationError,
    },
}

impl ChannelError {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            ChannelError::SegmentationFailure { id } => *id,
            ChannelError::MalformedObservation { id, .. } => *id,
        }
    }

    pub(super) fn malformed(id: ChannelId, source: MalformedObservationError) -> ChannelError {
        ChannelError::MalformedObservation { id, source }
    }

    pub(super) fn from_segment_error(id: ChannelId, e: SegmentError) -> ChannelError {
        match e {
            SegmentError::NoDataStart => ChannelError::SegmentationFailure { id },
            SegmentError::MissingOnOffMarker => {
                ChannelError::malformed(id, MalformedObservationError::MissingOnOffMarker)
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedObservationError {
    #[error("Sample {index} is earlier than the sample before it")]
    NonMonotonicTime { index: usize },

    #[error("This is an on/off observation, but no sample marks the start of the 'off' pointing")]
    MissingOnOffMarker,

    #[error(transparent)]
    StoredWindow(#[from] WindowMetadataError),

    #[error("Stored calibration window '{window}' doesn't fit within the channel's {num_samples} samples")]
    WindowOutOfRange { window: String, num_samples: usize },
}
