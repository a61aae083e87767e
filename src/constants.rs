// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. `gaincal` should do as many
calculations as possible in double precision.
 */

/// The z-score below which pre- and post-calibration deltas are considered
/// statistically indistinguishable (the median of a half-normal
/// distribution). Below this, a single weighted-average delta is applied;
/// otherwise the delta is interpolated in time.
pub const PROBABLE_ERROR_THRESHOLD: f64 = 0.6745;

/// The minimum number of points a linear fit needs. Fewer than this and the
/// uncertainties (which divide by `n - 2`) are meaningless.
pub const MIN_FIT_POINTS: usize = 3;

/// The Chauvenet criterion; a point is rejected when the expected number of
/// points at least as deviant as it is below this value.
pub const DEFAULT_CHAUVENET_CRITERION: f64 = 0.5;

/// The maximum number of reject-and-refit passes the robust fitter makes.
pub const DEFAULT_MAX_REJECTION_ITERATIONS: usize = 100;

/// The fraction of |residuals| below the robust scatter estimate (1σ of a
/// Gaussian).
pub const ONE_SIGMA_QUANTILE: f64 = 0.6827;

/// A putative pre-calibration is considered spurious if no more than this many
/// valid science samples (per interleaved channel) follow it before the sweep
/// becomes invalid again.
pub const DEFAULT_MIN_SCIENCE_SAMPLES: usize = 3;

/// The observing mode of an on/off observation. Hyphens are ignored when
/// comparing, so "on-off" matches too.
pub const ONOFF_OBS_MODE: &str = "onoff";

/// The marker in a sample's mode string that indicates the "off" pointing of an
/// on/off observation has started. Hyphens are ignored when comparing.
pub const ONOFF_OFF_MARKER: &str = "onoff:off";

/// The prefix of the observation-metadata keys that calibration windows are
/// stored under. The full key is `CALWIN_F{feed}_P{pol}`.
pub const WINDOW_METADATA_PREFIX: &str = "CALWIN";
