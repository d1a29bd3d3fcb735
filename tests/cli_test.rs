mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::{write_allocations_csv, write_investors_csv};
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_writes_dividend_register() {
    let dir = tempdir().unwrap();
    let investors = dir.path().join("investors.csv");
    let allocations = dir.path().join("allocations.csv");
    write_investors_csv(
        &investors,
        &[(1, true, false, "0"), (2, false, false, "0")],
    )
    .unwrap();
    write_allocations_csv(
        &allocations,
        &[
            (Some(1), None, "6000", "6000.00", "6000.00"),
            (Some(2), None, "4000", "4000.00", "0"),
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("divirail"));
    cmd.arg(&investors)
        .arg(&allocations)
        .args(["--total-usd", "10000.00"])
        .args(["--issued-at", "2025-06-30"])
        .args(["--withholding-rate", "15"]);

    cmd.assert()
        .success()
        // Investor 1: issued, 15% of 600000 withheld.
        .stdout(predicate::str::contains("1,1,6000,600000,600000,issued,,15,90000,510000"))
        // Investor 2: pending signup, withholding columns empty.
        .stdout(predicate::str::contains("1,2,4000,400000,0,pending_signup,,,,"))
        .stderr(predicate::str::contains("1 pending signup"));
}

#[test]
fn test_cli_expands_pass_through_entities_inline() {
    // An entity row with no directory backing is rejected: the CLI's
    // in-memory directory only knows the investors CSV, so entity rows
    // must name investors that exist.
    let dir = tempdir().unwrap();
    let investors = dir.path().join("investors.csv");
    let allocations = dir.path().join("allocations.csv");
    write_investors_csv(&investors, &[(1, true, false, "0")]).unwrap();
    write_allocations_csv(
        &allocations,
        &[(None, Some("Alpha Fund LP"), "100", "1000.00", "0")],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("divirail"));
    cmd.arg(&investors)
        .arg(&allocations)
        .args(["--total-usd", "1000.00"])
        .args(["--issued-at", "2025-06-30"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Alpha Fund LP"));
}

#[test]
fn test_cli_rejects_invalid_computation() {
    let dir = tempdir().unwrap();
    let investors = dir.path().join("investors.csv");
    let allocations = dir.path().join("allocations.csv");
    write_investors_csv(&investors, &[(1, true, false, "0")]).unwrap();
    write_allocations_csv(&allocations, &[]).unwrap();

    let mut cmd = Command::new(cargo_bin!("divirail"));
    cmd.arg(&investors)
        .arg(&allocations)
        .args(["--total-usd", "0"])
        .args(["--issued-at", "2025-06-30"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no allocation rows"));
}
