use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn world2geo_reports_region_and_cell() {
    let mut cmd = Command::cargo_bin("geo").unwrap();
    cmd.args(["world2geo", "-327680", "-262144"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("region=(11, 10)"));
}

#[test]
fn geo2world_round_trips_world2geo() {
    let mut cmd = Command::cargo_bin("geo").unwrap();
    cmd.args(["geo2world", "11", "10", "0", "0"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("world=(-327680, -262144)"));
}
