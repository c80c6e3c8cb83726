use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn morning_markup() -> &'static str {
    r#"<background>
  <starttime>
    <hour>6</hour>
    <minute>0</minute>
    <second>0</second>
  </starttime>
  <static>
    <duration>3600</duration>
    <file>a.png</file>
  </static>
  <transition type="overlay">
    <duration>1800</duration>
    <from>a.png</from>
    <to>b.png</to>
  </transition>
</background>
"#
}

fn simple_text_program() -> &'static str {
    "stw: 1.0\nname: day-and-night\nformat: \n@06:00: dawn.png\n@20:00-21:00: dawn.png .. night.png\n"
}

#[test]
fn convert_emits_the_text_form() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("morning.xml");
    fs::write(&input, morning_markup()).expect("write markup");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("convert")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("stw: 1.0"))
        .stdout(predicate::str::contains("format: %s.png"))
        .stdout(predicate::str::contains("@06:00: a"))
        .stdout(predicate::str::contains("@07:00-07:30: a .. b"));
}

#[test]
fn convert_writes_a_loadable_output_file() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("morning.xml");
    let output = dir.path().join("morning.stw");
    fs::write(&input, morning_markup()).expect("write markup");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("convert")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let mut info = cargo_bin_cmd!("timedwall");
    info.arg("info")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("number of static tags = 1"))
        .stdout(predicate::str::contains("number of transitions = 1"));
}

#[test]
fn convert_rejects_text_programs() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("day.stw");
    fs::write(&input, simple_text_program()).expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("convert")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a markup program"));
}

#[test]
fn info_reports_the_program_shape() {
    let dir = tempdir().expect("tempdir");
    let program = dir.path().join("day.stw");
    fs::write(&program, simple_text_program()).expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("info")
        .arg(&program)
        .assert()
        .success()
        .stdout(predicate::str::contains("name                  = day-and-night"))
        .stdout(predicate::str::contains("number of static tags = 1"))
        .stdout(predicate::str::contains("number of transitions = 1"))
        .stdout(predicate::str::contains("night.png"));
}

#[test]
fn info_describes_markup_programs() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("morning.xml");
    fs::write(&input, morning_markup()).expect("write markup");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("info")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("start time            = 06:00"))
        .stdout(predicate::str::contains("number of static tags = 1"))
        .stdout(predicate::str::contains("number of transitions = 1"))
        .stdout(predicate::str::contains("b.png"));
}

#[test]
fn info_emits_json_when_asked() {
    let dir = tempdir().expect("tempdir");
    let program = dir.path().join("day.stw");
    fs::write(&program, simple_text_program()).expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("info")
        .arg(&program)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"day-and-night\""))
        .stdout(predicate::str::contains("\"event\": \"transition\""));
}

#[test]
fn malformed_event_lines_fail_with_position() {
    let dir = tempdir().expect("tempdir");
    let program = dir.path().join("broken.stw");
    fs::write(&program, "stw: 1.0\n@13:37 /tmp/x.jpg\n").expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("info")
        .arg(&program)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("missing colon"));
}

#[test]
fn missing_version_header_fails_clearly() {
    let dir = tempdir().expect("tempdir");
    let program = dir.path().join("versionless.stw");
    fs::write(&program, "name: nope\n@13:37: x.png\n").expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("info")
        .arg(&program)
        .assert()
        .failure()
        .stderr(predicate::str::contains("stw"));
}

#[test]
fn normalize_sorts_lines_and_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let program = dir.path().join("day.stw");
    let first = dir.path().join("first.stw");
    let second = dir.path().join("second.stw");
    fs::write(
        &program,
        "stw: 1.0\nname: n\nformat: \n@19:00: dusk.png\n@06:00: dawn.png\n",
    )
    .expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("normalize")
        .arg(&program)
        .arg("--output")
        .arg(&first)
        .assert()
        .success();

    let canonical = fs::read_to_string(&first).expect("read canonical");
    let dawn = canonical.find("@06:00: dawn.png").expect("dawn line");
    let dusk = canonical.find("@19:00: dusk.png").expect("dusk line");
    assert!(dawn < dusk);

    let mut again = cargo_bin_cmd!("timedwall");
    again
        .arg("normalize")
        .arg(&first)
        .arg("--output")
        .arg(&second)
        .assert()
        .success();
    assert_eq!(
        canonical,
        fs::read_to_string(&second).expect("read second")
    );
}

#[test]
fn run_rejects_a_zero_loop_wait() {
    let dir = tempdir().expect("tempdir");
    let program = dir.path().join("day.stw");
    fs::write(&program, simple_text_program()).expect("write program");

    let mut cmd = cargo_bin_cmd!("timedwall");
    cmd.arg("run")
        .arg(&program)
        .arg("--set-command")
        .arg("true")
        .arg("--loop-wait")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--loop-wait"));
}
