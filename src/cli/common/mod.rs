// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. Both the `calibrate` and
//! `find-windows` subcommands read an observation, select channels, segment
//! them and write the observation back out, so those arguments are shared.

mod printers;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use clap::Parser;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{constants::DEFAULT_MIN_SCIENCE_SAMPLES, segment::Segmenter};

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    static ref MIN_SCIENCE_SAMPLES_HELP: String =
        format!("A science start followed by this many (or fewer) valid samples before the sweep becomes invalid again is considered spurious. Default: {DEFAULT_MIN_SCIENCE_SAMPLES}");
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(GaincalError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(GaincalError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(GaincalError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Arguments shared by every subcommand that processes an observation.
#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct ObservationArgs {
    /// Path to the input observation (JSON).
    #[clap(short, long, help_heading = "INPUT AND OUTPUT")]
    pub(super) input: Option<PathBuf>,

    /// Path to write the output observation to. The default is to write next
    /// to the input, with a suffix added to its name.
    #[clap(short, long, help_heading = "INPUT AND OUTPUT")]
    pub(super) output: Option<PathBuf>,

    /// Only process channels of these feeds (IFNUM). The default is to process
    /// all feeds.
    #[clap(long, multiple_values(true), help_heading = "CHANNELS")]
    pub(super) feeds: Option<Vec<u16>>,

    #[clap(long, help = MIN_SCIENCE_SAMPLES_HELP.as_str(), help_heading = "SEGMENTATION")]
    pub(super) min_science_samples: Option<usize>,
}

/// [`ObservationArgs`] after they've been checked.
#[derive(Debug)]
pub(super) struct ObservationParams {
    pub(super) input: PathBuf,
    pub(super) output: PathBuf,
    pub(super) feeds: Option<HashSet<u16>>,
    pub(super) segmenter: Segmenter,
}

impl ObservationArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            input: self.input.or(other.input),
            output: self.output.or(other.output),
            feeds: self.feeds.or(other.feeds),
            min_science_samples: self.min_science_samples.or(other.min_science_samples),
        }
    }

    /// Check the arguments. If no output was given, it's derived from the input
    /// by appending `output_suffix` to its file stem.
    pub(super) fn parse(
        self,
        output_suffix: &str,
        printer: &mut InfoPrinter,
    ) -> Result<ObservationParams, ObservationArgsError> {
        let ObservationArgs {
            input,
            output,
            feeds,
            min_science_samples,
        } = self;

        let input = input.ok_or(ObservationArgsError::NoInput)?;
        if !input.exists() {
            return Err(ObservationArgsError::InputDoesntExist(input));
        }
        let output = match output {
            Some(o) => o,
            None => default_output(&input, output_suffix),
        };
        if output.is_dir() {
            return Err(ObservationArgsError::OutputIsDir(output));
        }
        if output == input {
            "The input observation will be overwritten".warn();
        }
        printer.push_block(vec![
            format!("Input:  {}", input.display()).into(),
            format!("Output: {}", output.display()).into(),
        ]);

        let feeds = feeds.map(|f| f.into_iter().collect::<HashSet<_>>());
        if let Some(feeds) = &feeds {
            printer.push_line(format!("Using feeds {}", feeds.iter().sorted().join(", ")).into());
        }

        let segmenter = Segmenter {
            min_science_samples: min_science_samples.unwrap_or(DEFAULT_MIN_SCIENCE_SAMPLES),
        };
        printer.push_line(
            format!(
                "Spurious science starts: {} samples or fewer",
                segmenter.min_science_samples
            )
            .into(),
        );

        Ok(ObservationParams {
            input,
            output,
            feeds,
            segmenter,
        })
    }
}

/// `dir/obs.json` with suffix "_windows" becomes `dir/obs_windows.json`.
pub(super) fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}.json"))
}

#[derive(Error, Debug)]
pub(super) enum ObservationArgsError {
    #[error("No input observation was specified")]
    NoInput,

    #[error("The input observation {0:?} doesn't exist")]
    InputDoesntExist(PathBuf),

    #[error("The output path {0:?} is a directory")]
    OutputIsDir(PathBuf),
}
