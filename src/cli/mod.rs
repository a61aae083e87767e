// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `gaincal`
//! subcommands are contained in modules.
//!
//! All booleans must have `#[serde(default)]` annotated, and anything that
//! isn't a boolean must be optional. This allows all arguments to be optional
//! *and* usable in an arguments file.
//!
//! Only 3 things should be public in this module: `Gaincal`, `Gaincal::run`,
//! and `GaincalError`.

#[macro_use]
mod common;
mod calibrate;
mod error;
mod find_windows;

pub use error::GaincalError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::PROGRESS_BARS;

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Noise-diode gain calibration of single-dish spectral observations"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Gaincal {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the input arguments into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "cal")]
    #[clap(
        about = "Divide the science data of every channel by the gain deltas measured from its noise-diode calibration sweeps."
    )]
    Calibrate(calibrate::CalibrateArgs),

    #[clap(
        about = "Find and store the calibration window of every channel without calibrating."
    )]
    FindWindows(find_windows::FindWindowsArgs),
}

impl Gaincal {
    pub fn run(self) -> Result<(), GaincalError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
        } = self.global_opts;
        setup_logging(verbosity).map_err(|e| GaincalError::Generic(e.to_string()))?;
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of gaincal and its build-time information.
        let sub_command = match &self.command {
            Command::Calibrate(_) => "calibrate",
            Command::FindWindows(_) => "find-windows",
        };
        info!("gaincal {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        macro_rules! merge_save_run {
            ($args:expr) => {{
                let args = $args.merge()?;
                if let Some(toml) = save_toml {
                    use std::{
                        fs::File,
                        io::{BufWriter, Write},
                    };

                    let mut f = BufWriter::new(File::create(toml)?);
                    let toml_str = toml::to_string(&args).map_err(|e| {
                        GaincalError::Generic(format!("Couldn't serialise arguments: {e}"))
                    })?;
                    f.write_all(toml_str.as_bytes())?;
                }
                args.run(dry_run)?;
            }};
        }

        match self.command {
            Command::Calibrate(args) => {
                merge_save_run!(args)
            }

            Command::FindWindows(args) => {
                merge_save_run!(args)
            }
        }

        info!("gaincal {} complete.", sub_command);
        Ok(())
    }
}

/// Send log messages to stdout. A verbosity of 0 logs info, 1 logs debug and
/// 2 or more logs trace. From 3, each line also carries a timestamp and the
/// module and line it came from.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .target(env_logger::Target::Stdout)
        .format_target(false)
        .filter_level(level);
    if verbosity >= 3 {
        builder.format(|buf, record| {
            use std::io::Write;

            writeln!(
                buf,
                "[{} {:<5} {}:{}] {}",
                buf.timestamp(),
                record.level(),
                record.module_path().unwrap_or_else(|| record.target()),
                record.line().unwrap_or(0),
                record.args()
            )
        });
    }
    builder.try_init()
}

/// Log the git revision and toolchain this binary was built from.
fn display_build_info() {
    let revision = match (GIT_COMMIT_HASH_SHORT, GIT_DIRTY) {
        (Some(hash), Some(true)) => format!("{hash} (dirty)"),
        (Some(hash), _) => hash.to_string(),
        (None, _) => "<no git info>".to_string(),
    };
    let head = GIT_HEAD_REF
        .map(|r| format!(" on {r}"))
        .unwrap_or_default();
    info!("Built from git revision {revision}{head}");
    info!("Built at {BUILT_TIME_UTC} by {RUSTC_VERSION}");
    info!("");
}
