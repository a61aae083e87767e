// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all linear-fitting-related errors.

use thiserror::Error;

use crate::constants::MIN_FIT_POINTS;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("A linear fit needs at least {MIN_FIT_POINTS} points, but only {available} were available")]
    InsufficientData { available: usize },

    #[error("The x and y inputs have different lengths ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },

    #[error("The linear fit is singular (all x values are identical or non-finite)")]
    Singular,
}
