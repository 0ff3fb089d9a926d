use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;

mod common;

use common::{path_as_str, user, write_config, write_desired, FakeUnifi, API_KEY, KEY_VAR};

fn apply(config: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("unifi-dhcp-sync"));
    cmd.arg("--config")
        .arg(path_as_str(config))
        .args(["apply", "--env", "dev"])
        .env(KEY_VAR, API_KEY);
    cmd
}

fn plan(config: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("unifi-dhcp-sync"));
    cmd.arg("--config")
        .arg(path_as_str(config))
        .args(["plan", "--env", "dev"])
        .env(KEY_VAR, API_KEY);
    cmd
}

#[test]
fn apply_converges_and_a_second_plan_is_empty() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(
        vec![
            user("u1", "aa:bb:cc:dd:ee:01", Some("10.0.0.5"), "printer"),
            user("u9", "aa:bb:cc:dd:ee:09", Some("10.0.0.9"), "old-nas"),
            user("u3", "aa:bb:cc:dd:ee:03", None, "laptop"),
        ],
        None,
    );
    let config = write_config(dir.path(), &fake.base_url());
    write_desired(
        dir.path(),
        "dev",
        json!([
            { "mac_address": "AA:BB:CC:DD:EE:01", "ip_address": "10.0.0.50", "hostname": "printer", "description": "lobby" },
            { "mac_address": "aa:bb:cc:dd:ee:02", "ip_address": "10.0.0.6", "hostname": "cam" },
            { "mac_address": "aa:bb:cc:dd:ee:03", "ip_address": "10.0.0.7", "hostname": "laptop" }
        ]),
    );

    apply(&config)
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("APPLIED remove aa:bb:cc:dd:ee:09"))
        .stdout(predicate::str::contains("APPLIED update aa:bb:cc:dd:ee:01"))
        .stdout(predicate::str::contains("APPLIED add aa:bb:cc:dd:ee:02"))
        .stdout(predicate::str::contains("state=converged applied=4 failed=0"));

    let removed = fake.user("aa:bb:cc:dd:ee:09").expect("u9");
    assert_eq!(removed["use_fixedip"], false);
    let updated = fake.user("aa:bb:cc:dd:ee:01").expect("u1");
    assert_eq!(updated["fixed_ip"], "10.0.0.50");
    assert_eq!(updated["note"], "lobby");
    let created = fake.user("aa:bb:cc:dd:ee:02").expect("created");
    assert_eq!(created["use_fixedip"], true);
    // Known client reserved in place rather than duplicated.
    let laptop = fake.user("aa:bb:cc:dd:ee:03").expect("u3");
    assert_eq!(laptop["_id"], "u3");
    assert_eq!(laptop["fixed_ip"], "10.0.0.7");

    plan(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("= dev is in sync"));
}

#[test]
fn removals_need_confirmation() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(
        vec![
            user("u1", "aa:bb:cc:dd:ee:01", Some("10.0.0.5"), "printer"),
            user("u9", "aa:bb:cc:dd:ee:09", Some("10.0.0.9"), "old-nas"),
        ],
        None,
    );
    let config = write_config(dir.path(), &fake.base_url());
    write_desired(
        dir.path(),
        "dev",
        json!([{ "mac_address": "aa:bb:cc:dd:ee:01", "ip_address": "10.0.0.5", "hostname": "printer" }]),
    );

    apply(&config)
        .write_stdin("n\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("SKIPPED remove aa:bb:cc:dd:ee:09"))
        .stderr(predicate::str::contains("Remove 1 reservations from Default Site?"))
        .stderr(predicate::str::contains("removals not confirmed"));
    assert_eq!(fake.writes(), 0);

    apply(&config)
        .write_stdin("yes\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("state=converged"));
    assert_eq!(fake.writes(), 1);
}

#[test]
fn no_remove_keeps_unlisted_reservations() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(
        vec![user("u9", "aa:bb:cc:dd:ee:09", Some("10.0.0.9"), "manual")],
        None,
    );
    let config = write_config(dir.path(), &fake.base_url());
    write_desired(
        dir.path(),
        "dev",
        json!([{ "mac_address": "aa:bb:cc:dd:ee:02", "ip_address": "10.0.0.6", "hostname": "cam" }]),
    );

    apply(&config)
        .arg("--no-remove")
        .assert()
        .success()
        .stdout(predicate::str::contains("state=converged applied=1"))
        .stdout(predicate::str::contains("protected=1"));
    assert_eq!(fake.user("aa:bb:cc:dd:ee:09").expect("u9")["use_fixedip"], true);
}

#[test]
fn empty_desired_state_refuses_to_wipe_the_site() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(
        vec![user("u1", "aa:bb:cc:dd:ee:01", Some("10.0.0.5"), "printer")],
        None,
    );
    let config = write_config(dir.path(), &fake.base_url());
    write_desired(dir.path(), "dev", json!([]));

    apply(&config)
        .arg("--yes")
        .assert()
        .failure()
        .stdout(predicate::str::contains("! desired state is empty"))
        .stderr(predicate::str::contains("apply dev aborted"));
    assert_eq!(fake.writes(), 0);

    apply(&config)
        .args(["--yes", "--allow-full-removal"])
        .assert()
        .success();
    assert_eq!(fake.user("aa:bb:cc:dd:ee:01").expect("u1")["use_fixedip"], false);
}

#[test]
fn failed_change_is_reported_and_the_rest_still_run() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::start(Vec::new(), Some("aa:bb:cc:dd:ee:01"));
    let config = write_config(dir.path(), &fake.base_url());
    write_desired(
        dir.path(),
        "dev",
        json!([
            { "mac_address": "aa:bb:cc:dd:ee:01", "ip_address": "10.0.0.5", "hostname": "a" },
            { "mac_address": "aa:bb:cc:dd:ee:02", "ip_address": "10.0.0.6", "hostname": "b" }
        ]),
    );

    let output = apply(&config)
        .args(["--format", "json"])
        .output()
        .expect("run");
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["state"], "partially_failed");
    assert_eq!(report["changes"][0]["status"], "failed");
    assert_eq!(report["changes"][1]["status"], "applied");
    assert!(fake.user("aa:bb:cc:dd:ee:02").is_some());
    assert!(fake.user("aa:bb:cc:dd:ee:01").is_none());
}

#[cfg(unix)]
#[test]
fn interrupt_stops_apply_after_the_change_in_flight() {
    let dir = tempdir().expect("tempdir");
    let fake = FakeUnifi::with_write_delay(Vec::new(), None, Some(Duration::from_secs(2)));
    let config = write_config(dir.path(), &fake.base_url());
    write_desired(
        dir.path(),
        "dev",
        json!([
            { "mac_address": "aa:bb:cc:dd:ee:01", "ip_address": "10.0.0.1", "hostname": "one" },
            { "mac_address": "aa:bb:cc:dd:ee:02", "ip_address": "10.0.0.2", "hostname": "two" },
            { "mac_address": "aa:bb:cc:dd:ee:03", "ip_address": "10.0.0.3", "hostname": "three" }
        ]),
    );

    let child = std::process::Command::new(assert_cmd::cargo::cargo_bin!("unifi-dhcp-sync"))
        .arg("--config")
        .arg(path_as_str(&config))
        .args(["apply", "--env", "dev", "--yes"])
        .env(KEY_VAR, API_KEY)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");

    let deadline = Instant::now() + Duration::from_secs(30);
    while fake.writes() == 0 {
        assert!(Instant::now() < deadline, "no write reached the controller");
        thread::sleep(Duration::from_millis(20));
    }
    let sent = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("kill");
    assert!(sent.success());

    let output = child.wait_with_output().expect("wait");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stdout.contains("APPLIED add aa:bb:cc:dd:ee:01"), "{stdout}");
    assert_eq!(stdout.lines().filter(|l| l.contains("SKIPPED")).count(), 2);
    assert!(stdout.contains("state=cancelled"), "{stdout}");
    assert!(stderr.contains("apply dev cancelled"), "{stderr}");
    assert_eq!(fake.writes(), 1);
    assert!(fake.user("aa:bb:cc:dd:ee:02").is_none());
}
