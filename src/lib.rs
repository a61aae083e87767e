// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Noise-diode gain calibration of single-dish spectral observations.

Each (feed, polarisation) channel of an observation is bracketed by
calibration sweeps in which a noise diode is switched on and off. The
difference between the diode-on and diode-off levels (the gain delta) is
measured before and after the science data, and the science data is divided by
either a weighted average of the two deltas or a linear interpolation between
them.
 */

pub mod apply;
pub mod calibrate;
mod cli;
pub mod constants;
pub mod delta;
pub mod fitting;
pub mod io;
pub(crate) mod math;
pub mod observation;
pub mod segment;

#[cfg(test)]
mod tests;

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn? This should only ever be enabled by CLI
/// code.
static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use apply::{AppliedDelta, CalibrationDecision};
pub use calibrate::{CalibrationReport, ChannelReport, ChannelStatus, GainCalParams};
pub use cli::{Gaincal, GaincalError};
pub use delta::{DeltaEstimator, GainDelta, Side};
pub use fitting::{LinearFitter, OrdinaryLeastSquares, RobustChauvenetFitter};
pub use observation::{Channel, ChannelId, Observation, Sample, SampleTable};
pub use segment::{CalibrationWindow, Segmenter};
