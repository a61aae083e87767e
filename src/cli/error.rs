// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all gaincal-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::{calibrate::CalibrateArgsError, common::ObservationArgsError};
use crate::io::{ObservationReadError, ObservationWriteError};

/// The *only* publicly visible error from gaincal. Each error message should
/// suggest what the user can do about it, unless it's "generic".
#[derive(Error, Debug)]
pub enum GaincalError {
    /// An error related to calibrate arguments.
    #[error("{0}\n\nSee `gaincal calibrate --help` for the accepted values.")]
    Calibrate(String),

    /// An error related to reading observations.
    #[error("{0}\n\nObservations are JSON files with a \"date\" and a list of \"rows\"; each row needs \"date_obs\", \"calstate\", \"swpvalid\", \"ifnum\", \"plnum\" and \"data\".")]
    ObservationRead(String),

    /// An error related to writing observations or reports.
    #[error("{0}")]
    ObservationWrite(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files use the same names as the command-line arguments, with underscores instead of hyphens.")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<CalibrateArgsError> for GaincalError {
    fn from(e: CalibrateArgsError) -> Self {
        let s = e.to_string();
        match e {
            CalibrateArgsError::ZeroBinsPerBlock
            | CalibrateArgsError::BadRejectionCriterion(_) => Self::Calibrate(s),
        }
    }
}

impl From<ObservationArgsError> for GaincalError {
    fn from(e: ObservationArgsError) -> Self {
        let s = e.to_string();
        match e {
            ObservationArgsError::NoInput
            | ObservationArgsError::InputDoesntExist(_)
            | ObservationArgsError::OutputIsDir(_) => Self::Generic(s),
        }
    }
}

impl From<ObservationReadError> for GaincalError {
    fn from(e: ObservationReadError) -> Self {
        let s = e.to_string();
        match e {
            ObservationReadError::Date { .. }
            | ObservationReadError::Flag { .. }
            | ObservationReadError::SpectrumLength { .. }
            | ObservationReadError::NoRows
            | ObservationReadError::Json { .. } => Self::ObservationRead(s),
            ObservationReadError::IO(e) => Self::from(e),
        }
    }
}

impl From<ObservationWriteError> for GaincalError {
    fn from(e: ObservationWriteError) -> Self {
        let s = e.to_string();
        match e {
            ObservationWriteError::Json(_) => Self::ObservationWrite(s),
            ObservationWriteError::IO(e) => Self::from(e),
        }
    }
}

impl From<std::io::Error> for GaincalError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
