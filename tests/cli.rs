use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn manifast() -> Command {
    Command::cargo_bin("manifast").expect("binary exists")
}

#[test]
fn manifast_run_greeting_demo() {
    let mut cmd = manifast();
    cmd.arg("run").arg("demos/halo.mf");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Halo dari Manifast!"))
        .stdout(predicate::str::contains("Manifast\t17"))
        .stdout(predicate::str::contains("3\tTIGA"));
}

#[test]
fn every_demo_runs_cleanly() {
    let mut demos = 0;
    for entry in fs::read_dir("demos").expect("demos directory exists") {
        let path = entry.expect("read demo entry").path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("mf") {
            continue;
        }
        demos += 1;
        manifast()
            .arg("run")
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("[ERROR RUNTIME]").not())
            .stdout(predicate::str::contains("Assertion Failed").not());
    }
    assert!(demos >= 3, "expected demo scripts, found {demos}");
}

#[test]
fn manifast_eval_snippet() {
    let mut cmd = manifast();
    cmd.arg("eval").arg("println(1 + 2 + 3)");
    cmd.assert().success().stdout("6\n");
}

#[test]
fn failing_script_exits_with_marker() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("gagal.mf");
    fs::write(
        &script,
        "println(\"mulai\")\nlokal a = [1]\nprintln(a[2])\nprintln(\"tidak dicapai\")\n",
    )
    .expect("write script");

    let mut cmd = manifast();
    cmd.arg("run").arg(&script);
    cmd.assert()
        .failure()
        .stdout(predicate::str::starts_with("mulai\n[ERROR RUNTIME] runtime error at 3:"))
        .stdout(predicate::str::contains("tidak dicapai").not());
}

#[test]
fn failing_assert_exits_with_assertion_marker() {
    let mut cmd = manifast();
    cmd.arg("eval").arg("print(\"x\")\nassert(salah, \"harus benar\")");
    cmd.assert()
        .failure()
        .stdout("x\n[ASSERT GAGAL] Assertion Failed: harus benar\n");
}

#[test]
fn step_budget_flag_limits_execution() {
    let mut cmd = manifast();
    cmd.args(["--step-budget", "50", "eval", "selama benar lakukan tutup"]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("step budget of 50 exhausted"));
}

#[test]
fn missing_script_is_an_error() {
    let dir = tempdir().expect("create temp dir");
    let mut cmd = manifast();
    cmd.arg("run").arg(dir.path().join("tidak-ada.mf"));
    cmd.assert().failure();
}
