// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibrating every channel of an observation.
//!
//! Each (feed, polarisation) channel is copied out of the observation,
//! segmented, has its pre- and post-calibration deltas estimated and applied,
//! and is then written back. Channels are independent, so they're processed in
//! parallel; the write-back happens afterwards, one channel at a time.

mod error;
mod report;

pub use error::{ChannelError, MalformedObservationError};
pub use report::{BinReport, CalibrationReport, ChannelReport, ChannelStatus};

use std::{collections::HashSet, num::NonZeroUsize};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    apply::apply_deltas,
    delta::{DeltaEstimator, Side},
    fitting::{LinearFitter, RobustChauvenetFitter},
    observation::{Channel, ChannelId, SampleTable},
    segment::{CalibrationWindow, Segmenter},
    PROGRESS_BARS,
};

/// Parameters needed to perform gain calibration.
pub struct GainCalParams {
    /// The backend for every calibration-sweep fit.
    pub fitter: Box<dyn LinearFitter>,

    pub segmenter: Segmenter,

    /// See [`DeltaEstimator::bins_per_block`].
    pub bins_per_block: NonZeroUsize,

    /// See [`DeltaEstimator::smoothing_window`].
    pub smoothing_window: usize,

    /// If set, only channels of these feeds are calibrated.
    pub feeds: Option<HashSet<u16>>,

    /// Use calibration windows stored in the observation's metadata instead of
    /// segmenting channels again.
    pub reuse_windows: bool,

    /// Store each channel's calibration window in the observation's metadata.
    pub write_window_metadata: bool,
}

impl Default for GainCalParams {
    fn default() -> Self {
        Self {
            fitter: Box::new(RobustChauvenetFitter::default()),
            segmenter: Segmenter::default(),
            bins_per_block: NonZeroUsize::MIN,
            smoothing_window: 0,
            feeds: None,
            reuse_windows: false,
            write_window_metadata: true,
        }
    }
}

/// A channel copied out of the observation, waiting to be processed.
struct ChannelJob {
    channel: Channel,
    stored_window: Option<String>,
}

impl GainCalParams {
    /// Calibrate all selected channels of `table` in place.
    pub fn calibrate<T: SampleTable + ?Sized>(&self, table: &mut T) -> CalibrationReport {
        let obs_mode = table.obs_mode().to_string();
        let (jobs, skipped) = self.collect_jobs(table);
        debug!(
            "Calibrating {} channels ({} skipped)",
            jobs.len(),
            skipped.len()
        );

        let estimator = DeltaEstimator {
            fitter: self.fitter.as_ref(),
            bins_per_block: self.bins_per_block,
            smoothing_window: self.smoothing_window,
        };
        let pb = make_calibration_progress_bar(jobs.len(), "Calibrating channels".to_string());
        let results: Vec<(Channel, ChannelReport)> = jobs
            .into_par_iter()
            .map(|mut job| {
                let report = self.calibrate_channel(
                    &mut job.channel,
                    &obs_mode,
                    job.stored_window.as_deref(),
                    &estimator,
                );
                pb.inc(1);
                (job.channel, report)
            })
            .collect();
        pb.finish();

        // Merge the results back into the observation.
        let mut channels = Vec::with_capacity(results.len() + skipped.len());
        for (channel, report) in results {
            if let Some(window) = report.window {
                if self.write_window_metadata && !report.window_reused {
                    table.set_metadata(
                        channel.id.window_metadata_key(),
                        window.to_metadata_string(),
                    );
                }
            }
            if report.num_calibrated_bins() > 0 {
                table.write_back(&channel);
            }
            channels.push(report);
        }
        channels.extend(skipped.into_iter().map(ChannelReport::skipped));
        channels.sort_unstable_by_key(|c| c.id);

        let report = CalibrationReport { channels };
        log_coverage(&report);
        report
    }

    /// Find the calibration window of every selected channel without
    /// calibrating anything. Windows are written to the observation's
    /// metadata if `write_window_metadata` is set.
    pub fn find_windows<T: SampleTable + ?Sized>(
        &self,
        table: &mut T,
    ) -> Vec<(ChannelId, Result<CalibrationWindow, ChannelError>)> {
        let obs_mode = table.obs_mode().to_string();
        let (jobs, _) = self.collect_jobs(table);
        let windows: Vec<(ChannelId, Result<CalibrationWindow, ChannelError>)> = jobs
            .into_par_iter()
            .map(|job| {
                let window = self
                    .find_window(&job.channel, &obs_mode, job.stored_window.as_deref())
                    .map(|(window, _)| window);
                (job.channel.id, window)
            })
            .collect();

        for (id, window) in &windows {
            match window {
                Ok(window) => {
                    info!("{id}: calibration window {}", window.to_metadata_string());
                    if self.write_window_metadata {
                        table.set_metadata(id.window_metadata_key(), window.to_metadata_string());
                    }
                }
                Err(e) => warn!("{e}"),
            }
        }
        windows
    }

    /// Copy the selected channels out of `table`. Also returns the IDs of the
    /// channels that weren't selected.
    fn collect_jobs<T: SampleTable + ?Sized>(&self, table: &T) -> (Vec<ChannelJob>, Vec<ChannelId>) {
        let (selected, skipped): (Vec<ChannelId>, Vec<ChannelId>) = table
            .channel_ids()
            .into_iter()
            .partition(|id| self.feeds.as_ref().map_or(true, |f| f.contains(&id.feed)));
        if let Some(feeds) = &self.feeds {
            for feed in feeds.iter().sorted() {
                if !selected.iter().any(|id| id.feed == *feed) {
                    warn!("Feed {feed} was selected, but isn't in the observation");
                }
            }
        }

        let jobs = selected
            .into_iter()
            .map(|id| ChannelJob {
                channel: table.extract_channel(id),
                stored_window: if self.reuse_windows {
                    table.metadata(&id.window_metadata_key()).map(str::to_string)
                } else {
                    None
                },
            })
            .collect();
        (jobs, skipped)
    }

    /// Get a channel's window, either from its stored string or by segmenting.
    /// The returned bool is true if the stored window was used.
    fn find_window(
        &self,
        channel: &Channel,
        obs_mode: &str,
        stored_window: Option<&str>,
    ) -> Result<(CalibrationWindow, bool), ChannelError> {
        let id = channel.id;
        if let Some(index) = channel.first_non_monotonic() {
            return Err(ChannelError::malformed(
                id,
                MalformedObservationError::NonMonotonicTime { index },
            ));
        }

        match stored_window {
            Some(s) => {
                let window = CalibrationWindow::from_metadata_str(s)
                    .map_err(|e| ChannelError::malformed(id, e.into()))?;
                let num_samples = channel.len();
                let fits = window.data_start < num_samples
                    && window.post_cal_start.map_or(true, |p| p <= num_samples)
                    && window.off_transition.map_or(true, |o| o < num_samples);
                if !fits {
                    return Err(ChannelError::malformed(
                        id,
                        MalformedObservationError::WindowOutOfRange {
                            window: s.to_string(),
                            num_samples,
                        },
                    ));
                }
                debug!("{id}: reusing stored calibration window {s}");
                Ok((window, true))
            }

            None => {
                let window = self
                    .segmenter
                    .find_window(&channel.samples, obs_mode)
                    .map_err(|e| ChannelError::from_segment_error(id, e))?;
                debug!("{id}: found calibration window {}", window.to_metadata_string());
                Ok((window, false))
            }
        }
    }

    /// Segment, estimate and apply for a single channel.
    fn calibrate_channel(
        &self,
        channel: &mut Channel,
        obs_mode: &str,
        stored_window: Option<&str>,
        estimator: &DeltaEstimator,
    ) -> ChannelReport {
        let id = channel.id;
        let (window, window_reused) = match self.find_window(channel, obs_mode, stored_window) {
            Ok(w) => w,
            Err(e) => return ChannelReport::failed(&e, channel.num_bins()),
        };

        let pre = estimator.estimate(channel, &window, Side::Pre);
        let post = estimator.estimate(channel, &window, Side::Post);
        let cals = apply_deltas(channel, &window, &pre, &post);
        let bins: Vec<BinReport> = cals
            .into_iter()
            .zip(pre.iter().zip(post.iter()))
            .enumerate()
            .map(|(bin, (cal, (pre, post)))| BinReport::new(bin, cal, pre, post))
            .collect();

        let any_pre = pre.iter().any(|d| d.is_ok());
        let any_post = post.iter().any(|d| d.is_ok());
        let status = if !bins.iter().any(|b| b.is_calibrated()) {
            ChannelStatus::Uncalibrated
        } else if !any_pre {
            ChannelStatus::PreCalibrationUnavailable
        } else if !any_post {
            ChannelStatus::PostCalibrationUnavailable
        } else {
            ChannelStatus::Calibrated
        };

        ChannelReport {
            id,
            status,
            window: Some(window),
            window_reused,
            error: None,
            num_bins: channel.num_bins(),
            bins,
        }
    }
}

/// Convenience function to make a progress bar while calibrating.
fn make_calibration_progress_bar(num_channels: usize, message: String) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_channels as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}

/// Report per-channel problems and the overall coverage.
fn log_coverage(report: &CalibrationReport) {
    for c in &report.channels {
        match c.status {
            ChannelStatus::Failed => {
                warn!(
                    "{} left uncalibrated: {}",
                    c.id,
                    c.error.as_deref().unwrap_or("unknown error")
                )
            }
            ChannelStatus::Uncalibrated => {
                warn!("{}: no bin had a usable gain delta", c.id)
            }
            ChannelStatus::PreCalibrationUnavailable => {
                warn!("{}: pre-calibration unavailable; used post-calibration only", c.id)
            }
            ChannelStatus::PostCalibrationUnavailable => {
                warn!("{}: post-calibration unavailable; used pre-calibration only", c.id)
            }
            ChannelStatus::Calibrated | ChannelStatus::Skipped => (),
        }
    }

    let num_processed = report.num_processed_channels();
    let num_calibrated = report.num_calibrated_channels();
    info!(
        "{}/{} ({}%) channels calibrated",
        num_calibrated,
        num_processed,
        percentage(num_calibrated, num_processed)
    );
    let (cal_bins, total_bins) = report.bin_coverage();
    info!(
        "{}/{} ({}%) bins calibrated",
        cal_bins,
        total_bins,
        percentage(cal_bins, total_bins)
    );
    let decisions = report
        .decision_counts()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(decision, count)| format!("{decision}: {count}"))
        .join(", ");
    if !decisions.is_empty() {
        debug!("Bin decisions: {decisions}");
    }
}

fn percentage(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (n as f64 / total as f64 * 100.0).round()
    }
}
