// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;
use crate::tests::synthetic::{runs, samples_from_kinds, standard_layout, Kind::*};

#[test]
fn test_standard_layout() {
    let samples = samples_from_kinds(&standard_layout(10));
    let window = Segmenter::default().find_window(&samples, "").unwrap();
    assert_eq!(
        window,
        CalibrationWindow {
            data_start: 6,
            post_cal_start: Some(16),
            off_transition: None,
        }
    );
    assert_eq!(window.pre_range(), 0..6);
    assert_eq!(window.science_range(samples.len()), 6..16);
    assert_eq!(window.post_range(samples.len()), 16..22);
    assert_eq!(window.boundaries(), vec![Some(6), Some(16)]);
}

#[test]
fn test_post_calibration_starting_with_diode_off() {
    let kinds = runs(&[(On, 3), (Off, 3), (Sci, 10), (Off, 3), (On, 3)]);
    let samples = samples_from_kinds(&kinds);
    let window = Segmenter::default().find_window(&samples, "").unwrap();
    assert_eq!(window.data_start, 6);
    assert_eq!(window.post_cal_start, Some(16));
}

#[test]
fn test_lone_blip_doesnt_end_science() {
    let kinds = runs(&[(On, 3), (Off, 3), (Sci, 5), (Off, 1), (Sci, 5), (On, 3), (Off, 3)]);
    let samples = samples_from_kinds(&kinds);
    let window = Segmenter::default().find_window(&samples, "").unwrap();
    assert_eq!(window.data_start, 6);
    assert_eq!(window.post_cal_start, Some(17));
}

#[test]
fn test_spurious_science_start_is_skipped() {
    let kinds = runs(&[
        (On, 3),
        (Off, 3),
        (Sci, 2),
        (Off, 2),
        (On, 3),
        (Off, 3),
        (Sci, 10),
        (On, 3),
        (Off, 3),
    ]);
    let samples = samples_from_kinds(&kinds);
    let window = Segmenter::default().find_window(&samples, "").unwrap();
    assert_eq!(window.data_start, 16);
    assert_eq!(window.post_cal_start, Some(26));
}

#[test]
fn test_spurious_threshold_is_configurable() {
    // With a threshold of 1, the two-sample run counts as the science.
    let kinds = runs(&[
        (On, 3),
        (Off, 3),
        (Sci, 2),
        (Off, 2),
        (On, 3),
        (Off, 3),
        (Sci, 10),
        (On, 3),
        (Off, 3),
    ]);
    let samples = samples_from_kinds(&kinds);
    let segmenter = Segmenter {
        min_science_samples: 1,
    };
    let window = segmenter.find_window(&samples, "").unwrap();
    assert_eq!(window.data_start, 6);
    assert_eq!(window.post_cal_start, Some(8));
}

#[test]
fn test_missing_post_calibration() {
    let kinds = runs(&[(On, 3), (Off, 3), (Sci, 10)]);
    let samples = samples_from_kinds(&kinds);
    let window = Segmenter::default().find_window(&samples, "").unwrap();
    assert_eq!(window.data_start, 6);
    assert_eq!(window.post_cal_start, None);
    assert_eq!(window.science_range(samples.len()), 6..16);
    assert!(window.post_range(samples.len()).is_empty());
    assert_eq!(window.to_metadata_string(), "6,None");
}

#[test]
fn test_fallback_without_calibration() {
    let kinds = runs(&[(Sci, 5), (Off, 3)]);
    let samples = samples_from_kinds(&kinds);
    let window = Segmenter::default().find_window(&samples, "").unwrap();
    assert_eq!(window.data_start, 0);
    assert_eq!(window.post_cal_start, Some(5));
    assert!(window.pre_range().is_empty());
}

#[test]
fn test_no_data_start() {
    let kinds = runs(&[(On, 3), (Off, 3)]);
    let samples = samples_from_kinds(&kinds);
    let result = Segmenter::default().find_window(&samples, "");
    assert_eq!(result, Err(SegmentError::NoDataStart));

    let result = Segmenter::default().find_window(&[], "");
    assert_eq!(result, Err(SegmentError::NoDataStart));
}

#[test]
fn test_onoff_transition() {
    let mut samples = samples_from_kinds(&standard_layout(10));
    for (i, s) in samples.iter_mut().enumerate() {
        s.mode = if i < 11 { "onoff:on" } else { "onoff:off" }.to_string();
    }

    let window = Segmenter::default()
        .find_window(&samples, "onoff")
        .unwrap();
    assert_eq!(window.off_transition, Some(11));
    assert_eq!(window.boundaries(), vec![Some(6), Some(10), Some(11), Some(16)]);
    assert_eq!(window.to_metadata_string(), "6,10,11,16");

    // Hyphens and case don't matter.
    for s in samples.iter_mut() {
        s.mode = s.mode.replace("onoff", "On-Off");
    }
    let window = Segmenter::default()
        .find_window(&samples, "ON-OFF")
        .unwrap();
    assert_eq!(window.off_transition, Some(11));
}

#[test]
fn test_onoff_without_marker() {
    let samples = samples_from_kinds(&standard_layout(10));
    let result = Segmenter::default().find_window(&samples, "onoff");
    assert_eq!(result, Err(SegmentError::MissingOnOffMarker));
}

#[test]
fn test_other_modes_ignore_marker() {
    let mut samples = samples_from_kinds(&standard_layout(10));
    samples[11].mode = "onoff:off".to_string();
    let window = Segmenter::default()
        .find_window(&samples, "track")
        .unwrap();
    assert_eq!(window.off_transition, None);
    assert!(!is_onoff("track"));
    assert!(is_onoff(" OnOff "));
}

#[test]
fn test_science_start_precedes_post_calibration() {
    for num_science in 4..30 {
        let samples = samples_from_kinds(&standard_layout(num_science));
        let window = Segmenter::default().find_window(&samples, "").unwrap();
        assert_eq!(window.data_start, 6);
        assert_eq!(window.post_cal_start, Some(6 + num_science));
        assert!(window.data_start < window.post_cal_start.unwrap());
    }
}

#[test]
fn test_metadata_round_trip() {
    for s in ["6,16", "6,None", "6,10,11,16", "6,10,11,None"] {
        let window = CalibrationWindow::from_metadata_str(s).unwrap();
        assert_eq!(window.to_metadata_string(), s);
    }

    let window = CalibrationWindow::from_metadata_str(" 6, 10, 11, 16").unwrap();
    assert_eq!(window.data_start, 6);
    assert_eq!(window.off_transition, Some(11));
    assert_eq!(window.post_cal_start, Some(16));
}

#[test]
fn test_metadata_errors() {
    assert_eq!(
        CalibrationWindow::from_metadata_str("a,5"),
        Err(WindowMetadataError::Value("a".to_string()))
    );
    assert_eq!(
        CalibrationWindow::from_metadata_str("1,2,3"),
        Err(WindowMetadataError::Count(3))
    );
    assert_eq!(
        CalibrationWindow::from_metadata_str("None,5"),
        Err(WindowMetadataError::NoDataStart)
    );
    assert_eq!(
        CalibrationWindow::from_metadata_str("10,5"),
        Err(WindowMetadataError::Order {
            data_start: 10,
            post: 5
        })
    );
}
