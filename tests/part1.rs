use assert_cmd::Command;
use predicates::prelude::predicate::str;

#[test]
fn part1_output_right_answer() {
    let mut cmd = Command::cargo_bin("part1").unwrap();
    cmd.arg("sample.txt");

    cmd.assert().success().stdout(str::contains("is 7."));
}

#[test]
fn part1_fails_without_lights() {
    let mut cmd = Command::cargo_bin("part1").unwrap();
    cmd.arg("sample_infeasible.txt");

    cmd.assert()
        .failure()
        .stderr(str::contains("Machine 1 failed: No indicator light diagram given."));
}
