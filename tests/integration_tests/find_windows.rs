// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against the `find-windows` subcommand.

use tempfile::TempDir;

use crate::{gaincal, get_cmd_output, read_json, write_observation};

#[test]
fn test_find_windows_then_reuse() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = write_observation(tmp_dir.path());
    let windows = tmp_dir.path().join("obs_windows.json");

    let cmd = gaincal()
        .args(["find-windows", "-i", &format!("{}", input.display())])
        .arg("--no-progress-bars")
        .ok();
    assert!(cmd.is_ok(), "find-windows failed: {:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Found calibration windows for 2/2 channels"), "{stdout}");

    let obs = read_json(&windows);
    assert_eq!(obs["metadata"]["CALWIN_F0_P0"], "10,20");
    // Nothing was calibrated.
    assert_eq!(obs["rows"][20]["data"][0], 100.0);

    #[rustfmt::skip]
    let cmd = gaincal()
        .args([
            "calibrate",
            "-i", &format!("{}", windows.display()),
            "--reuse-windows",
            "--no-progress-bars",
            "-v",
        ])
        .ok();
    assert!(cmd.is_ok(), "calibrate failed: {:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("reusing stored calibration window 10,20"), "{stdout}");
}
