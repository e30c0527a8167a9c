use assert_cmd::Command;
use predicates::prelude::predicate::str;

#[test]
fn part2_output_right_answer() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.arg("sample.txt");

    cmd.assert().success().stdout(str::contains("is 33."));
}

#[test]
fn part2_exhaustive_solver_agrees() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.args(["sample.txt", "--solver", "exhaustive", "--timeout-secs", "60"]);

    cmd.assert().success().stdout(str::contains("is 33."));
}

#[test]
fn part2_inspects_one_machine() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.args(["sample.txt", "--inspect", "1"]);

    cmd.assert()
        .success()
        .stdout(str::contains("Machine 1: presses per button"))
        .stdout(str::contains("12 in total."));
}

#[test]
fn part2_reports_infeasible_machine() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.arg("sample_infeasible.txt");

    cmd.assert()
        .failure()
        .stderr(str::contains("Machine 1 failed"))
        .stderr(str::contains("hits every joltage target exactly"));
}

#[test]
fn part2_rejects_small_counter_limit() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.args(["sample.txt", "--max-positions", "4"]);

    cmd.assert()
        .failure()
        .stderr(str::contains("Machine 1 failed"))
        .stderr(str::contains("Button affects counter 4"));
}

#[test]
fn part2_reports_malformed_line() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.arg("sample_malformed.txt");

    cmd.assert()
        .failure()
        .stderr(str::contains("Failed to parse machine at line 3"))
        .stderr(str::contains("Invalid token(<x>)"));
}

#[test]
fn part2_rejects_inspect_past_last_machine() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.args(["sample.txt", "--inspect", "9"]);

    cmd.assert()
        .failure()
        .stderr(str::contains("No machine 9 to inspect, given 3 machine(s)."));
}

#[test]
fn part2_rejects_huge_counter_limit() {
    let mut cmd = Command::cargo_bin("part2").unwrap();
    cmd.args(["sample.txt", "--max-positions", "100000000"]);

    cmd.assert()
        .failure()
        .stderr(str::contains("expect at most 64"));
}
