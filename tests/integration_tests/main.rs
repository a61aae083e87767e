// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod calibrate;
mod find_windows;
mod no_stderr;

use std::{
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use serde_json::{json, Value};

fn gaincal() -> Command {
    Command::cargo_bin("gaincal").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// (CALSTATE, SWPVALID) of each timestep: 5 diode on, 5 diode off, 10 science,
/// 5 diode on, 5 diode off.
fn layout() -> Vec<(u8, u8)> {
    let mut layout = vec![(1, 0); 5];
    layout.extend([(0, 0); 5]);
    layout.extend([(0, 1); 10]);
    layout.extend([(1, 0); 5]);
    layout.extend([(0, 0); 5]);
    layout
}

/// Diode on reads 10, diode off reads 5 and science reads 100 in every bin, so
/// every gain delta is 5 and calibrated science reads 20.
fn intensity(calstate: u8, swpvalid: u8) -> f64 {
    match (calstate, swpvalid) {
        (0, 1) => 100.0,
        (1, _) => 10.0,
        _ => 5.0,
    }
}

/// Write an observation with two feeds (one polarisation each) and 4 bins to
/// `dir/obs.json`.
fn write_observation(dir: &Path) -> PathBuf {
    let mut rows = vec![];
    for (i, (calstate, swpvalid)) in layout().into_iter().enumerate() {
        for feed in 0..2 {
            rows.push(json!({
                "date_obs": format!("2024-05-01T03:{:02}:{:02}", i / 60, i % 60),
                "calstate": calstate,
                "swpvalid": swpvalid,
                "ifnum": feed,
                "plnum": 0,
                "data": vec![intensity(calstate, swpvalid); 4],
            }));
        }
    }
    let obs = json!({
        "date": "2024-05-01T03:00:00",
        "obs_mode": "",
        "metadata": { "OBSERVER": "integration test" },
        "rows": rows,
    });

    let path = dir.join("obs.json");
    std::fs::write(&path, obs.to_string()).unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
