//! End-to-end runs of the `nearlink` binary against the in-memory radio.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn nearlink(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nearlink").unwrap();
    cmd.current_dir(dir.path()).env("RUST_LOG", "warn").arg("--mock");
    cmd
}

#[test]
fn scan_lists_demo_devices_as_json() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["scan", "--timeout-ms", "100", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARES_Pixel"))
        .stdout(predicate::str::contains("Buds"))
        .stdout(predicate::str::contains("Car Kit"))
        .stdout(predicate::str::contains("Unknown Device (DD:04)"));
}

#[test]
fn scan_named_hides_unknown_devices() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["scan", "--timeout-ms", "100", "--named"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARES_Pixel"))
        .stdout(predicate::str::contains("Unknown Device (").not());
}

#[test]
fn send_reaches_demo_peer() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["send", "BB:BB:BB:BB:BB:02", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered 5 bytes"));
}

#[test]
fn send_payment_payload() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args([
            "send",
            "BB:BB:BB:BB:BB:02",
            "--amount",
            "1200",
            "--id",
            "212121",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered"));
}

#[test]
fn send_rejects_bad_address() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["send", "not-an-address", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid device address"));
}

#[test]
fn pair_with_demo_peer() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["pair", "BB:BB:BB:BB:BB:02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Paired with BB:BB:BB:BB:BB:02"));
}

#[test]
fn paired_lists_bonded_demo_device() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["paired", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Car Kit"))
        .stdout(predicate::str::contains("\"paired\""))
        .stdout(predicate::str::contains("ARES_Pixel").not());
}

#[test]
fn identity_from_config_resolves_broadcaster() {
    let dir = TempDir::new().unwrap();
    let mut config = NamedTempFile::new_in(dir.path()).unwrap();
    writeln!(
        config,
        "[identity]\nname = \"Pixel\"\nstable_id = \"8ddeebd2bcb19a1e\""
    )
    .unwrap();

    nearlink(&dir)
        .arg("--config")
        .arg(config.path())
        .arg("identity")
        .assert()
        .success()
        .stdout(predicate::str::contains("Role:      broadcaster"))
        .stdout(predicate::str::contains("Stable ID: 8ddeebd2bcb19a1e"));
}

#[test]
fn unreadable_config_fails() {
    let dir = TempDir::new().unwrap();
    nearlink(&dir)
        .args(["--config", "missing.toml", "identity"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
