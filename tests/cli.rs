use assert_cmd::Command;
use predicates::prelude::*;

use bagkit::extract::MANIFEST_FILE_NAME;
use bagkit::testing::{CAM0, write_fixture_bag};

fn bagkit() -> Command {
    Command::cargo_bin("bagkit").unwrap()
}

#[test]
fn help_lists_subcommands() {
    bagkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("images"))
        .stdout(predicate::str::contains("clip"))
        .stdout(predicate::str::contains("summary"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn version_flag_works() {
    bagkit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bagkit"));
}

#[test]
fn inspect_prints_topic_table() {
    let dir = tempfile::tempdir().unwrap();
    let bag = dir.path().join("test_images.bag");
    write_fixture_bag(&bag, 3).unwrap();

    bagkit()
        .arg("inspect")
        .arg(&bag)
        .assert()
        .success()
        .stdout(predicate::str::contains(CAM0))
        .stdout(predicate::str::contains("sensor_msgs/CompressedImage"));
}

#[test]
fn summary_writes_json_into_output_folder() {
    let dir = tempfile::tempdir().unwrap();
    let bag = dir.path().join("test_images.bag");
    write_fixture_bag(&bag, 2).unwrap();
    let out = dir.path().join("meta");
    std::fs::create_dir(&out).unwrap();

    bagkit()
        .args(["summary", "--input"])
        .arg(&bag)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let json = std::fs::read_to_string(out.join("rosbag_metadata.json")).unwrap();
    assert!(json.contains("\"Topics\""));
    assert!(json.contains(CAM0));
}

#[test]
fn clip_rejects_unknown_timestamp_type_before_touching_output() {
    let dir = tempfile::tempdir().unwrap();
    let bag = dir.path().join("test_images.bag");
    write_fixture_bag(&bag, 2).unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    bagkit()
        .args(["clip", "--input"])
        .arg(&bag)
        .arg("--output")
        .arg(&out)
        .args(["--timestamp-type", "weird_type"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("weird_type"));

    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn clip_on_missing_input_fails_with_path_in_message() {
    let dir = tempfile::tempdir().unwrap();
    bagkit()
        .args(["clip", "--input", "/no/such/file.bag", "--output"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("/no/such/file.bag"));
}

#[test]
fn images_rejects_malformed_resize() {
    let dir = tempfile::tempdir().unwrap();
    let bag = dir.path().join("test_images.bag");
    write_fixture_bag(&bag, 2).unwrap();

    bagkit()
        .args(["images", "--input"])
        .arg(&bag)
        .arg("--output")
        .arg(dir.path().join("out"))
        .args(["--resize", "800x600"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid resize format"));
}

#[test]
fn images_end_to_end_with_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let bag = dir.path().join("test_images.bag");
    write_fixture_bag(&bag, 2).unwrap();
    let out = dir.path().join("out");

    bagkit()
        .args(["images", "--input"])
        .arg(&bag)
        .arg("--output")
        .arg(&out)
        .args(["--topics", CAM0, "--manifest"])
        .assert()
        .success();

    let topic_dir = out.join("alphasense_cam0_image_raw");
    assert!(
        topic_dir
            .join("alphasense_cam0_image_raw_000000.jpg")
            .is_file()
    );
    assert!(
        topic_dir
            .join("alphasense_cam0_image_raw_000001.jpg")
            .is_file()
    );
    assert!(topic_dir.join(MANIFEST_FILE_NAME).is_file());
}
