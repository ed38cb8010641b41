//! Integration tests for the summarize stage.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn summarize(input: &std::path::Path, output: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("batnexus");
    cmd.arg("summarize")
        .arg("--input")
        .arg(input)
        .arg("--output")
        .arg(output);
    cmd
}

#[test]
fn test_json_only_detection_passes_through() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    // No confidence anywhere in the batch: the row passes unfiltered and
    // the mean frequency is the band midpoint (40000+42000)/2000 = 41 kHz.
    std::fs::write(
        input.path().join("rec1_seg001.json"),
        r#"{"annotation":[{"start_time":0.1,"end_time":0.3,"low_freq":40000,"high_freq":42000}]}"#,
    )
    .unwrap();

    summarize(input.path(), output.path()).assert().success();

    let all = std::fs::read_to_string(output.path().join("all_detections.csv")).unwrap();
    let lines: Vec<&str> = all.lines().collect();
    assert_eq!(lines.len(), 2, "header plus exactly one canonical row");
    assert!(lines[1].contains("41"));
    assert!(lines[1].contains("Pipistrellus nathusii"));
}

#[test]
fn test_csv_species_takes_priority_over_band_rule() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    std::fs::write(
        input.path().join("rec1_seg001.json"),
        r#"{"annotation":[{"start_time":0.1,"end_time":0.3,"low_freq":40000,"high_freq":42000}]}"#,
    )
    .unwrap();
    std::fs::write(
        input.path().join("rec1_seg001.csv"),
        "start_time,end_time,class,det_prob\n0.1,0.3,Myotis daubentonii,0.95\n",
    )
    .unwrap();

    summarize(input.path(), output.path()).assert().success();

    let all = std::fs::read_to_string(output.path().join("all_detections.csv")).unwrap();
    assert!(all.contains("Myotis daubentonii"));
    assert!(!all.contains("Pipistrellus nathusii"));

    let summary = std::fs::read_to_string(output.path().join("species_summary.csv")).unwrap();
    assert!(summary.contains("Myotis daubentonii,1"));

    let per_file = std::fs::read_to_string(output.path().join("species_per_file.csv")).unwrap();
    assert!(per_file.contains("rec1_seg001,Myotis daubentonii"));
}

#[test]
fn test_confidence_threshold_applies_to_json_path() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    std::fs::write(
        input.path().join("rec1_seg001.json"),
        concat!(
            r#"{"annotation":["#,
            r#"{"start_time":0.1,"end_time":0.3,"freq_mean":41000,"det_prob":0.9},"#,
            r#"{"start_time":1.0,"end_time":1.2,"freq_mean":41000,"det_prob":0.2}"#,
            r#"]}"#
        ),
    )
    .unwrap();

    summarize(input.path(), output.path())
        .arg("--threshold")
        .arg("0.5")
        .assert()
        .success();

    let all = std::fs::read_to_string(output.path().join("all_detections.csv")).unwrap();
    assert_eq!(all.lines().count(), 2, "low-confidence row is dropped");
}

#[test]
fn test_no_data_is_a_clean_stop() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    summarize(input.path(), output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));

    assert!(!output.path().join("all_detections.csv").exists());
}

#[test]
fn test_malformed_file_does_not_abort_the_batch() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    std::fs::write(input.path().join("broken.json"), "{not json").unwrap();
    std::fs::write(
        input.path().join("rec1_seg001.json"),
        r#"{"annotation":[{"start_time":0.1,"end_time":0.3,"freq_mean":55000}]}"#,
    )
    .unwrap();

    summarize(input.path(), output.path()).assert().success();

    let all = std::fs::read_to_string(output.path().join("all_detections.csv")).unwrap();
    assert_eq!(all.lines().count(), 2);
}
