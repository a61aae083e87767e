// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against the `calibrate` subcommand.

use std::io::Write;

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use crate::{gaincal, get_cmd_output, read_json, write_observation};

#[test]
fn test_calibrate() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = write_observation(tmp_dir.path());
    let report = tmp_dir.path().join("report.json");

    #[rustfmt::skip]
    let cmd = gaincal()
        .args([
            "calibrate",
            "-i", &format!("{}", input.display()),
            "--report", &format!("{}", report.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "calibrate failed: {:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("2/2 (100%) channels calibrated"), "{stdout}");
    assert!(stdout.contains("Built from git revision"), "{stdout}");
    assert!(stdout.contains("gaincal calibrate complete."), "{stdout}");

    let output = read_json(&tmp_dir.path().join("obs_gain_calibrated.json"));
    assert_eq!(output["metadata"]["OBSERVER"], "integration test");
    assert_eq!(output["metadata"]["CALWIN_F0_P0"], "10,20");
    assert_eq!(output["metadata"]["CALWIN_F1_P0"], "10,20");
    for row in output["rows"].as_array().unwrap() {
        let science = row["calstate"] == 0 && row["swpvalid"] == 1;
        for v in row["data"].as_array().unwrap() {
            let v = v.as_f64().unwrap();
            if science {
                assert_abs_diff_eq!(v, 20.0, epsilon = 1e-10);
            } else {
                assert!(v == 10.0 || v == 5.0, "calibration sweep changed: {v}");
            }
        }
    }

    let report = read_json(&report);
    assert_eq!(report["summary"]["num_channels"], 2);
    assert_eq!(report["summary"]["num_calibrated_bins"], 8);
    assert_eq!(report["channels"][1]["feed"], 1);
    assert_eq!(report["channels"][1]["status"], "calibrated");
    assert_eq!(report["channels"][1]["window"]["data_start"], 10);
}

#[test]
fn test_calibrate_arg_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = write_observation(tmp_dir.path());
    let output = tmp_dir.path().join("calibrated.json");
    let arg_file = tmp_dir.path().join("args.toml");
    {
        let mut f = std::fs::File::create(&arg_file).unwrap();
        writeln!(f, "bins_per_block = 4").unwrap();
        writeln!(f, "[observation]").unwrap();
        writeln!(f, "input = {:?}", input.display().to_string()).unwrap();
        writeln!(f, "output = {:?}", output.display().to_string()).unwrap();
        writeln!(f, "feeds = [1]").unwrap();
    }

    let cmd = gaincal()
        .args(["calibrate", &format!("{}", arg_file.display())])
        .arg("--no-progress-bars")
        .ok();
    assert!(cmd.is_ok(), "calibrate failed: {:?}", get_cmd_output(cmd));

    let output = read_json(&output);
    assert!(output["metadata"].get("CALWIN_F0_P0").is_none());
    assert_eq!(output["metadata"]["CALWIN_F1_P0"], "10,20");
    for row in output["rows"].as_array().unwrap() {
        if row["calstate"] == 0 && row["swpvalid"] == 1 {
            let expected = if row["ifnum"] == 1 { 20.0 } else { 100.0 };
            assert_abs_diff_eq!(row["data"][0].as_f64().unwrap(), expected, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_save_toml_reproduces_arguments() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = write_observation(tmp_dir.path());
    let toml = tmp_dir.path().join("saved.toml");

    #[rustfmt::skip]
    let cmd = gaincal()
        .args([
            "calibrate",
            "-i", &format!("{}", input.display()),
            "--smoothing-window", "1",
            "--save-toml", &format!("{}", toml.display()),
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "calibrate failed: {:?}", get_cmd_output(cmd));
    assert!(!tmp_dir.path().join("obs_gain_calibrated.json").exists());

    let saved = std::fs::read_to_string(&toml).unwrap();
    assert!(saved.contains("smoothing_window = 1"), "{saved}");
    assert!(saved.contains("[observation]"), "{saved}");

    // Running from the saved arguments does the calibration.
    let cmd = gaincal()
        .args(["calibrate", &format!("{}", toml.display())])
        .arg("--no-progress-bars")
        .ok();
    assert!(cmd.is_ok(), "calibrate failed: {:?}", get_cmd_output(cmd));
    assert!(tmp_dir.path().join("obs_gain_calibrated.json").exists());
}

#[test]
fn test_missing_input() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let missing = tmp_dir.path().join("missing.json");

    let cmd = gaincal()
        .args(["calibrate", "-i", &format!("{}", missing.display())])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("doesn't exist"), "{stderr}");
}

#[test]
fn test_malformed_observation() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = tmp_dir.path().join("bad.json");
    std::fs::write(
        &input,
        r#"{ "date": "2024-05-01T03:00:00", "rows": [
            { "date_obs": "2024-05-01T03:00:01", "calstate": 3, "swpvalid": 0,
              "ifnum": 0, "plnum": 0, "data": [1.0] } ] }"#,
    )
    .unwrap();

    let cmd = gaincal()
        .args(["calibrate", "-i", &format!("{}", input.display())])
        .arg("--no-progress-bars")
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("CALSTATE must be 0 or 1"), "{stderr}");
}

#[test]
fn test_unsegmentable_channels_are_not_fatal() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = tmp_dir.path().join("cal_only.json");
    std::fs::write(
        &input,
        r#"{ "date": "2024-05-01T03:00:00", "rows": [
            { "date_obs": "2024-05-01T03:00:01", "calstate": 1, "swpvalid": 0,
              "ifnum": 0, "plnum": 0, "data": [10.0] },
            { "date_obs": "2024-05-01T03:00:02", "calstate": 0, "swpvalid": 0,
              "ifnum": 0, "plnum": 0, "data": [5.0] } ] }"#,
    )
    .unwrap();
    let output = tmp_dir.path().join("out.json");

    #[rustfmt::skip]
    let cmd = gaincal()
        .args([
            "calibrate",
            "-i", &format!("{}", input.display()),
            "-o", &format!("{}", output.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "calibrate failed: {:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Couldn't find the start of the science data"), "{stdout}");
    assert!(stdout.contains("0/1 (0%) bins calibrated"), "{stdout}");

    let output = read_json(&output);
    assert_eq!(output["rows"][0]["data"][0], 10.0);
    assert_eq!(output["rows"][1]["data"][0], 5.0);
}
