// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `find-windows` subcommand: segment every channel and store the
//! calibration windows, without calibrating anything.


use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{display_warnings, InfoPrinter, ObservationArgs, ARG_FILE_HELP};
use crate::{
    calibrate::GainCalParams,
    io::{read_observation, write_observation},
    GaincalError,
};

pub(super) const DEFAULT_OUTPUT_SUFFIX: &str = "_windows";

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FindWindowsArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "observation")]
    #[serde(default)]
    pub(super) obs_args: ObservationArgs,
}

impl FindWindowsArgs {
    pub(super) fn merge(self) -> Result<FindWindowsArgs, GaincalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let FindWindowsArgs {
                args_file: _,
                obs_args,
            } = unpack_arg_file!(arg_file);

            Ok(FindWindowsArgs {
                args_file: None,
                obs_args: cli_args.obs_args.merge(obs_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), GaincalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);

        let mut printer = InfoPrinter::new("Calibration window info".into());
        let obs_params = self.obs_args.parse(DEFAULT_OUTPUT_SUFFIX, &mut printer)?;
        printer.display();
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let params = GainCalParams {
            segmenter: obs_params.segmenter,
            feeds: obs_params.feeds,
            write_window_metadata: true,
            ..Default::default()
        };
        let mut obs = read_observation(&obs_params.input)?;
        let windows = params.find_windows(&mut obs);
        let num_found = windows.iter().filter(|(_, w)| w.is_ok()).count();
        info!(
            "Found calibration windows for {num_found}/{} channels",
            windows.len()
        );

        write_observation(&obs, &obs_params.output)?;
        info!("Observation written to {}", obs_params.output.display());
        Ok(())
    }
}
