// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `calibrate` subcommand.


use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    display_warnings, InfoPrinter, ObservationArgs, ObservationParams, Warn, ARG_FILE_HELP,
};
use crate::{
    calibrate::GainCalParams,
    constants::{DEFAULT_CHAUVENET_CRITERION, DEFAULT_MAX_REJECTION_ITERATIONS},
    fitting::{LinearFitter, OrdinaryLeastSquares, RobustChauvenetFitter},
    io::{read_observation, write_observation, write_report},
    observation::SampleTable,
    GaincalError,
};

pub(super) const DEFAULT_OUTPUT_SUFFIX: &str = "_gain_calibrated";

lazy_static::lazy_static! {
    static ref REJECTION_CRITERION_HELP: String =
        format!("Points whose expected number of equally-deviant points falls below this value are rejected from calibration-sweep fits. Default: {DEFAULT_CHAUVENET_CRITERION}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CalibrateArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "observation")]
    #[serde(default)]
    pub(super) obs_args: ObservationArgs,

    /// Path to write a JSON report of every channel's and bin's calibration.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    pub(super) report: Option<PathBuf>,

    /// Average this many neighbouring frequency bins together before fitting
    /// calibration sweeps. A value equal to the number of bins fits the
    /// channel mean. Default: 1
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) bins_per_block: Option<usize>,

    /// Replace each gain delta with the mean of the deltas within this many
    /// bins of it. The default is no smoothing.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) smoothing_window: Option<usize>,

    #[clap(long, help = REJECTION_CRITERION_HELP.as_str(), help_heading = "CALIBRATION")]
    pub(super) rejection_criterion: Option<f64>,

    /// Don't reject outliers when fitting calibration sweeps; use ordinary
    /// least squares.
    #[clap(long, conflicts_with = "rejection-criterion", help_heading = "CALIBRATION")]
    #[serde(default)]
    pub(super) no_outlier_rejection: bool,

    /// Use the calibration windows stored in the observation's metadata (e.g.
    /// by a previous run) instead of segmenting channels again.
    #[clap(long, help_heading = "SEGMENTATION")]
    #[serde(default)]
    pub(super) reuse_windows: bool,

    /// Don't store calibration windows in the output observation's metadata.
    #[clap(long, help_heading = "SEGMENTATION")]
    #[serde(default)]
    pub(super) no_window_metadata: bool,
}

/// Everything needed to run `calibrate`.
pub(super) struct CalibrateParams {
    pub(super) obs_params: ObservationParams,
    pub(super) report: Option<PathBuf>,
    pub(super) gaincal_params: GainCalParams,
}

impl CalibrateArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<CalibrateArgs, GaincalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let CalibrateArgs {
                args_file: _,
                obs_args,
                report,
                bins_per_block,
                smoothing_window,
                rejection_criterion,
                no_outlier_rejection,
                reuse_windows,
                no_window_metadata,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(CalibrateArgs {
                args_file: None,
                obs_args: cli_args.obs_args.merge(obs_args),
                report: cli_args.report.or(report),
                bins_per_block: cli_args.bins_per_block.or(bins_per_block),
                smoothing_window: cli_args.smoothing_window.or(smoothing_window),
                rejection_criterion: cli_args.rejection_criterion.or(rejection_criterion),
                no_outlier_rejection: cli_args.no_outlier_rejection || no_outlier_rejection,
                reuse_windows: cli_args.reuse_windows || reuse_windows,
                no_window_metadata: cli_args.no_window_metadata || no_window_metadata,
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<CalibrateParams, GaincalError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            obs_args,
            report,
            bins_per_block,
            smoothing_window,
            rejection_criterion,
            no_outlier_rejection,
            reuse_windows,
            no_window_metadata,
        } = self;

        let mut printer = InfoPrinter::new("Gain calibration info".into());
        let obs_params = obs_args.parse(DEFAULT_OUTPUT_SUFFIX, &mut printer)?;
        if let Some(report) = &report {
            printer.push_line(
                format!("Writing a calibration report to {}", report.display()).into(),
            );
        }

        let bins_per_block = match bins_per_block {
            None => NonZeroUsize::MIN,
            Some(n) => NonZeroUsize::new(n).ok_or(CalibrateArgsError::ZeroBinsPerBlock)?,
        };
        let smoothing_window = smoothing_window.unwrap_or(0);
        if smoothing_window > 0 && bins_per_block.get() > 1 {
            format!("Smoothing deltas over {smoothing_window} bins when {bins_per_block} bins already share each delta").warn();
        }

        let fitter: Box<dyn LinearFitter> = if no_outlier_rejection {
            Box::new(OrdinaryLeastSquares)
        } else {
            let criterion = rejection_criterion.unwrap_or(DEFAULT_CHAUVENET_CRITERION);
            if !criterion.is_finite() || criterion <= 0.0 {
                return Err(CalibrateArgsError::BadRejectionCriterion(criterion).into());
            }
            Box::new(RobustChauvenetFitter {
                criterion,
                max_iterations: DEFAULT_MAX_REJECTION_ITERATIONS,
            })
        };

        let mut block = vec![];
        if no_outlier_rejection {
            block.push("Fitting sweeps with ordinary least squares".into());
        } else {
            block.push(
                format!(
                    "Fitting sweeps with Chauvenet outlier rejection (criterion {})",
                    rejection_criterion.unwrap_or(DEFAULT_CHAUVENET_CRITERION)
                )
                .into(),
            );
        }
        if bins_per_block.get() > 1 {
            block.push(format!("Averaging {bins_per_block} bins per fit").into());
        }
        if smoothing_window > 0 {
            block.push(format!("Smoothing deltas over ±{smoothing_window} bins").into());
        }
        printer.push_block(block);
        if reuse_windows {
            printer.push_line("Reusing stored calibration windows".into());
        }
        if no_window_metadata {
            printer.push_line("Not storing calibration windows".into());
        }

        printer.display();
        display_warnings();

        let ObservationParams {
            feeds, segmenter, ..
        } = &obs_params;
        let gaincal_params = GainCalParams {
            fitter,
            segmenter: *segmenter,
            bins_per_block,
            smoothing_window,
            feeds: feeds.clone(),
            reuse_windows,
            write_window_metadata: !no_window_metadata,
        };

        Ok(CalibrateParams {
            obs_params,
            report,
            gaincal_params,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), GaincalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()
    }
}

impl CalibrateParams {
    pub(super) fn run(self) -> Result<(), GaincalError> {
        let CalibrateParams {
            obs_params,
            report: report_file,
            gaincal_params,
        } = self;

        let mut obs = read_observation(&obs_params.input)?;
        info!(
            "Read {} rows ({} channels, {} bins each)",
            obs.num_samples(),
            obs.channel_ids().len(),
            obs.num_bins()
        );

        let report = gaincal_params.calibrate(&mut obs);
        if report.num_processed_channels() > 0 && report.num_calibrated_channels() == 0 {
            warn!("No channels could be calibrated; the output intensities are unchanged");
        }

        write_observation(&obs, &obs_params.output)?;
        info!(
            "Calibrated observation written to {}",
            obs_params.output.display()
        );
        if let Some(report_file) = report_file {
            write_report(&report, &report_file)?;
            info!("Calibration report written to {}", report_file.display());
        }

        Ok(())
    }
}

#[derive(Error, Debug)]
pub(super) enum CalibrateArgsError {
    #[error("The number of bins per block cannot be 0")]
    ZeroBinsPerBlock,

    #[error("The rejection criterion must be a positive number; got {0}")]
    BadRejectionCriterion(f64),
}
