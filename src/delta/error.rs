// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for gain-delta estimation.

use thiserror::Error;

use super::Side;
use crate::{constants::MIN_FIT_POINTS, fitting::FitError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeltaError {
    #[error("Not enough {side}-calibration samples; need at least {MIN_FIT_POINTS} diode-on and {MIN_FIT_POINTS} diode-off samples, but got {num_on} and {num_off}")]
    InsufficientCalibrationData {
        side: Side,
        num_on: usize,
        num_off: usize,
    },

    #[error("The {side}-calibration fit failed: {source}")]
    NumericalFitFailure { side: Side, source: FitError },
}
