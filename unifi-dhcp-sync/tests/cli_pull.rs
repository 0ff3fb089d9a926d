use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

mod common;

use common::{path_as_str, user, write_config, FakeUnifi, API_KEY, KEY_VAR};

fn run(config: &std::path::Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("unifi-dhcp-sync"));
    cmd.arg("--config")
        .arg(path_as_str(config))
        .args(args)
        .env(KEY_VAR, API_KEY);
    cmd
}

#[test]
fn pull_writes_the_live_reservations_as_desired_state() {
    let dir = tempdir().expect("tempdir");
    let mut laptop = user("u3", "AA:BB:CC:DD:EE:03", Some("10.0.0.7"), "laptop");
    laptop["note"] = serde_json::json!("desk 4");
    let fake = FakeUnifi::start(
        vec![
            user("u2", "aa:bb:cc:dd:ee:02", Some("10.0.0.6"), "cam"),
            laptop,
            user("u4", "aa:bb:cc:dd:ee:04", None, "phone"),
        ],
        None,
    );
    let config = write_config(dir.path(), &fake.base_url());

    run(&config, &["pull", "--env", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+ aa:bb:cc:dd:ee:02 10.0.0.6 cam"))
        .stdout(predicate::str::contains("saved 2 reservations"));

    let saved = fs::read_to_string(dir.path().join("state").join("dev.json")).expect("saved");
    let records: serde_json::Value = serde_json::from_str(&saved).expect("json");
    assert_eq!(records[1]["mac_address"], "aa:bb:cc:dd:ee:03");
    assert_eq!(records[1]["description"], "desk 4");
    assert_eq!(fake.writes(), 0);

    run(&config, &["plan", "--env", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("= dev is in sync"));
}

#[test]
fn list_prints_a_table_of_fixed_ip_clients() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(
        vec![
            user("u2", "aa:bb:cc:dd:ee:02", Some("10.0.0.6"), "cam"),
            user("u4", "aa:bb:cc:dd:ee:04", None, "phone"),
        ],
        None,
    );
    let config = write_config(dir.path(), &fake.base_url());

    run(&config, &["list", "--env", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aa:bb:cc:dd:ee:02  10.0.0.6"))
        .stdout(predicate::str::contains("phone").not())
        .stdout(predicate::str::contains("1 reservations"));
}

#[test]
fn check_accepts_a_valid_key() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(Vec::new(), None);
    let config = write_config(dir.path(), &fake.base_url());

    run(&config, &["check", "--env", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok environment=dev"));

    let recorded = fake.recorded();
    assert_eq!(recorded[0].url.path(), "/proxy/network/integration/v1/sites");
    assert_eq!(
        recorded[0]
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok()),
        Some(API_KEY)
    );
}

#[test]
fn check_reports_a_rejected_key() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(Vec::new(), None);
    let config = write_config(dir.path(), &fake.base_url());

    run(&config, &["check", "--env", "dev"])
        .env(KEY_VAR, "wrong-key")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid API key"))
        .stderr(predicate::str::contains("wrong-key").not());
}
