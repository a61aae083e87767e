// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to read and write observations and calibration reports as JSON.
//!
//! An observation file looks like:
//!
//! ```json
//! {
//!   "date": "2024-05-01T03:00:00",
//!   "obs_mode": "onoff",
//!   "metadata": { "OBSERVER": "someone" },
//!   "rows": [
//!     { "date_obs": "2024-05-01T03:00:01", "calstate": 1, "swpvalid": 0,
//!       "ifnum": 0, "plnum": 0, "obsmode": "onoff:on", "data": [1.0, 2.0] }
//!   ]
//! }
//! ```
//!
//! All dates are UTC. Missing intensities are `null`.

mod error;

pub use error::{ObservationReadError, ObservationWriteError};

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use hifitime::{Duration, Epoch};
use indexmap::IndexMap;
use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    apply::CalibrationDecision,
    calibrate::{CalibrationReport, ChannelReport, ChannelStatus},
    observation::{Observation, Sample},
};

#[derive(Debug, Serialize, Deserialize)]
struct ObservationFile {
    date: String,

    #[serde(default)]
    obs_mode: String,

    #[serde(default)]
    metadata: IndexMap<String, String>,

    rows: Vec<RowFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowFile {
    date_obs: String,
    calstate: u8,
    swpvalid: u8,
    ifnum: u16,
    plnum: u16,

    #[serde(default)]
    obsmode: String,

    data: Vec<Option<f64>>,
}

/// Read an observation from a JSON file.
pub fn read_observation(file: &Path) -> Result<Observation, ObservationReadError> {
    debug!("Reading observation {}", file.display());
    let f = BufReader::new(File::open(file)?);
    let obs_file: ObservationFile =
        serde_json::from_reader(f).map_err(|err| ObservationReadError::Json {
            file: file.display().to_string(),
            err,
        })?;
    observation_from_file(obs_file)
}

/// Parse an observation from a JSON string.
pub fn parse_observation(s: &str) -> Result<Observation, ObservationReadError> {
    let obs_file: ObservationFile =
        serde_json::from_str(s).map_err(|err| ObservationReadError::Json {
            file: "<string>".to_string(),
            err,
        })?;
    observation_from_file(obs_file)
}

fn observation_from_file(obs_file: ObservationFile) -> Result<Observation, ObservationReadError> {
    let date = parse_utc(&obs_file.date, None)?;
    let num_bins = match obs_file.rows.first() {
        Some(row) => row.data.len(),
        None => return Err(ObservationReadError::NoRows),
    };

    let mut samples = Vec::with_capacity(obs_file.rows.len());
    let mut data = Array2::zeros((obs_file.rows.len(), num_bins));
    for (i_row, (row, mut data_row)) in obs_file
        .rows
        .into_iter()
        .zip(data.outer_iter_mut())
        .enumerate()
    {
        if row.data.len() != num_bins {
            return Err(ObservationReadError::SpectrumLength {
                row: i_row,
                expected: num_bins,
                got: row.data.len(),
            });
        }
        let time = (parse_utc(&row.date_obs, Some(i_row))? - date).to_seconds();
        samples.push(Sample {
            time,
            calstate: parse_flag(row.calstate, i_row, "CALSTATE")?,
            swpvalid: parse_flag(row.swpvalid, i_row, "SWPVALID")?,
            feed: row.ifnum,
            pol: row.plnum,
            mode: row.obsmode,
        });
        data_row
            .iter_mut()
            .zip(row.data)
            .for_each(|(d, v)| *d = v.unwrap_or(f64::NAN));
    }
    debug!(
        "Read {} rows with {num_bins} bins each (obs mode '{}')",
        samples.len(),
        obs_file.obs_mode
    );

    Ok(Observation {
        date,
        obs_mode: obs_file.obs_mode,
        metadata: obs_file.metadata,
        samples,
        data,
    })
}

fn parse_flag(value: u8, row: usize, field: &'static str) -> Result<bool, ObservationReadError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ObservationReadError::Flag { row, field, value }),
    }
}

/// Parse an ISO 8601 date. A time scale may be appended ("... TAI"); UTC is
/// assumed if it isn't.
fn parse_utc(s: &str, row: Option<usize>) -> Result<Epoch, ObservationReadError> {
    let s = s.trim();
    let with_scale = if s.contains(char::is_whitespace) {
        s.to_string()
    } else {
        format!("{s} UTC")
    };
    Epoch::from_str(&with_scale).map_err(|e| ObservationReadError::Date {
        value: s.to_string(),
        row,
        err: e.to_string(),
    })
}

/// Format an epoch as an ISO 8601 UTC date without a time scale.
fn format_utc(epoch: Epoch) -> String {
    let (y, m, d, h, min, s, ns) = epoch.to_gregorian_utc();
    if ns == 0 {
        format!("{y:04}-{m:02}-{d:02}T{h:02}:{min:02}:{s:02}")
    } else {
        format!("{y:04}-{m:02}-{d:02}T{h:02}:{min:02}:{s:02}.{ns:09}")
    }
}

fn observation_to_file(obs: &Observation) -> ObservationFile {
    ObservationFile {
        date: format_utc(obs.date),
        obs_mode: obs.obs_mode.clone(),
        metadata: obs.metadata.clone(),
        rows: obs
            .samples
            .iter()
            .zip(obs.data.outer_iter())
            .map(|(s, data)| RowFile {
                date_obs: format_utc(obs.date + Duration::from_seconds(s.time)),
                calstate: u8::from(s.calstate),
                swpvalid: u8::from(s.swpvalid),
                ifnum: s.feed,
                plnum: s.pol,
                obsmode: s.mode.clone(),
                data: data.iter().map(|&v| v.is_finite().then_some(v)).collect(),
            })
            .collect(),
    }
}

/// Write an observation to a JSON file.
pub fn write_observation(obs: &Observation, file: &Path) -> Result<(), ObservationWriteError> {
    debug!("Writing observation {}", file.display());
    let mut f = BufWriter::new(File::create(file)?);
    serde_json::to_writer(&mut f, &observation_to_file(obs))?;
    f.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct ReportSummary {
    num_channels: usize,
    num_processed_channels: usize,
    num_calibrated_channels: usize,
    num_calibrated_bins: usize,
    num_bins: usize,
    statuses: IndexMap<ChannelStatus, usize>,
    decisions: IndexMap<CalibrationDecision, usize>,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    summary: ReportSummary,
    channels: &'a [ChannelReport],
}

/// Write a calibration report as pretty JSON.
pub fn write_report(report: &CalibrationReport, file: &Path) -> Result<(), ObservationWriteError> {
    debug!("Writing calibration report {}", file.display());
    let (num_calibrated_bins, num_bins) = report.bin_coverage();
    let report_file = ReportFile {
        summary: ReportSummary {
            num_channels: report.channels.len(),
            num_processed_channels: report.num_processed_channels(),
            num_calibrated_channels: report.num_calibrated_channels(),
            num_calibrated_bins,
            num_bins,
            statuses: report.status_counts(),
            decisions: report.decision_counts(),
        },
        channels: &report.channels,
    };

    let mut f = BufWriter::new(File::create(file)?);
    serde_json::to_writer_pretty(&mut f, &report_file)?;
    f.flush()?;
    Ok(())
}
