//! Integration tests for the physical validation stage.

use assert_cmd::cargo::cargo_bin_cmd;

fn write_reference(path: &std::path::Path) {
    std::fs::write(
        path,
        "Art,Hauptfrequenz_min kHz,Hauptfrequenz_max kHz,Rufdauer_min ms,Rufdauer_max ms\n\
         Zwergfledermaus (Pipistrellus pipistrellus),45,75,4,8\n\
         Wasserfledermaus (Myotis daubentonii),35,65,3,10\n",
    )
    .unwrap();
}

#[test]
fn test_validation_statuses_and_review_copies() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let reference = input.path().join("Frequenzen.csv");
    write_reference(&reference);

    // Verified: 50 kHz, 6 ms within the Pipistrellus bounds.
    let detections = tempfile::tempdir().unwrap();
    std::fs::write(
        detections.path().join("clean.csv"),
        "start_time,end_time,low_freq,class\n0.0,0.006,50000,Pipistrellus pipistrellus\n",
    )
    .unwrap();
    // Review: 12 ms duration outlier.
    std::fs::write(
        detections.path().join("outlier.csv"),
        "start_time,end_time,low_freq,class\n0.0,0.012,50000,Pipistrellus pipistrellus\n",
    )
    .unwrap();
    // Unknown: species with no reference entry.
    std::fs::write(
        detections.path().join("unknown.csv"),
        "start_time,end_time,low_freq,class\n0.0,0.005,20000,Nyctalus noctula\n",
    )
    .unwrap();

    let mut cmd = cargo_bin_cmd!("batnexus");
    cmd.arg("validate")
        .arg("--input")
        .arg(detections.path())
        .arg("--output")
        .arg(output.path())
        .arg("--reference")
        .arg(&reference);
    cmd.assert().success();

    let report = std::fs::read_to_string(output.path().join("validation_report.csv")).unwrap();
    assert!(report.contains("Validation_Status"));
    assert!(report.contains("NEXUS_Verified"));
    assert!(report.contains("Duration_Outlier(12.0ms)"));
    assert!(report.contains("Unknown_Species"));

    let review = output.path().join("manual_review");
    assert!(review.join("outlier.csv").exists());
    assert!(review.join("unknown.csv").exists());
    assert!(!review.join("clean.csv").exists());

    // Review copies are byte-identical to the originals.
    let original = std::fs::read(detections.path().join("outlier.csv")).unwrap();
    let copy = std::fs::read(review.join("outlier.csv")).unwrap();
    assert_eq!(original, copy);
}

#[test]
fn test_unparseable_reference_table_is_fatal() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let reference = input.path().join("Frequenzen.csv");
    std::fs::write(&reference, "Art,wrong,columns\nx,y,z\n").unwrap();

    let mut cmd = cargo_bin_cmd!("batnexus");
    cmd.arg("validate")
        .arg("--input")
        .arg(input.path())
        .arg("--output")
        .arg(output.path())
        .arg("--reference")
        .arg(&reference);
    cmd.assert().failure();
}
