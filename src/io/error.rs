// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading or writing observations and reports.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObservationReadError {
    #[error("Couldn't parse '{value}' as a UTC date (row {row:?}): {err}")]
    Date {
        value: String,
        /// `None` for the observation's reference date.
        row: Option<usize>,
        err: String,
    },

    #[error("Row {row}: {field} must be 0 or 1, but got {value}")]
    Flag {
        row: usize,
        field: &'static str,
        value: u8,
    },

    #[error("Row {row} has {got} spectral bins, but row 0 has {expected}")]
    SpectrumLength {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("The observation has no rows")]
    NoRows,

    #[error("When reading {file}: {err}")]
    Json {
        file: String,
        err: serde_json::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ObservationWriteError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
