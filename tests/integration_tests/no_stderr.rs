// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use tempfile::TempDir;

use crate::{gaincal, get_cmd_output, write_observation};

#[test]
fn test_calibrate_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = write_observation(tmp_dir.path());

    let cmd = gaincal()
        .args(["calibrate", "-i", &format!("{}", input.display())])
        .ok();
    assert!(
        cmd.is_ok(),
        "calibrate failed on simple test data: {}",
        cmd.err().unwrap()
    );
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_find_windows_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let input = write_observation(tmp_dir.path());

    let cmd = gaincal()
        .args(["find-windows", "-i", &format!("{}", input.display())])
        .ok();
    assert!(
        cmd.is_ok(),
        "find-windows failed on simple test data: {}",
        cmd.err().unwrap()
    );
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}
