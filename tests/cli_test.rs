use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const TENT: &str = "6f1c2a3e-4b5d-4c7e-8f90-a1b2c3d4e5f6";
const STOVE: &str = "0b7d9e21-3c4f-4a5b-9c6d-7e8f9a0b1c2d";
const KAYAK: &str = "c3d4e5f6-a7b8-4c9d-8e0f-1a2b3c4d5e6f";
const ALICE: &str = "11111111-1111-4111-8111-111111111111";
const BOB: &str = "22222222-2222-4222-8222-222222222222";

fn catalog() -> NamedTempFile {
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "id, name, price, available").unwrap();
    writeln!(csv, "{TENT}, Tent, 50, true").unwrap();
    writeln!(csv, "{STOVE}, Stove, 12.5, true").unwrap();
    writeln!(csv, "{KAYAK}, Kayak, 80, false").unwrap();
    csv
}

fn commands(rows: &[String]) -> NamedTempFile {
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "command,ref,user,start,end,lines,method,channel").unwrap();
    for row in rows {
        writeln!(csv, "{row}").unwrap();
    }
    csv
}

fn book(label: &str, user: &str, start: &str, end: &str, lines: &str) -> String {
    format!("book,{label},{user},2024-01-{start}T00:00:00Z,2024-01-{end}T00:00:00Z,{lines},,")
}

fn settle(target: &str, user: &str) -> String {
    format!("settle,{target},{user},,,,VIRTUAL_ACCOUNT,BCA")
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = catalog();
    let commands = commands(&[
        book("a1", ALICE, "01", "03", &format!("{TENT}*2")),
        settle("a1", ALICE),
        book("b2", BOB, "03", "05", &format!("{TENT}*1;{STOVE}*2")),
    ]);

    let mut cmd = Command::new(cargo_bin!("gearbook"));
    cmd.arg(catalog.path()).arg(commands.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "reservation,renter,start,end,total_cost,status",
        ))
        .stdout(predicate::str::contains(format!(
            "{ALICE},2024-01-01T00:00:00Z,2024-01-03T00:00:00Z,200,COMPLETED"
        )))
        .stdout(predicate::str::contains(format!(
            "{BOB},2024-01-03T00:00:00Z,2024-01-05T00:00:00Z,150,PENDING"
        )))
        .stderr(predicate::str::contains("Error").not());

    Ok(())
}

#[test]
fn test_cli_reports_rejected_commands_and_continues() {
    let catalog = catalog();
    let commands = commands(&[
        book("a1", ALICE, "01", "03", &format!("{TENT}*2")),
        settle("a1", ALICE),
        // overlaps the confirmed booking
        book("b1", BOB, "02", "04", &format!("{TENT}*1")),
        book("b2", BOB, "05", "06", &format!("{STOVE}*1")),
        // only the renter may pay
        settle("b2", ALICE),
        book("k1", BOB, "05", "06", &format!("{KAYAK}*1")),
        settle("missing", BOB),
        settle("a1", ALICE),
    ]);

    let mut cmd = Command::new(cargo_bin!("gearbook"));
    cmd.arg(catalog.path()).arg(commands.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",200,COMPLETED"))
        .stdout(predicate::str::contains(",12.5,PENDING"))
        .stdout(predicate::str::contains("2024-01-02T00:00:00Z").not())
        .stderr(predicate::str::contains("Error processing command: Conflict"))
        .stderr(predicate::str::contains("Error processing command: Forbidden"))
        .stderr(predicate::str::contains("Error processing command: Validation error"))
        .stderr(predicate::str::contains("Error processing command: Not found"));
}

#[test]
fn test_cli_skips_malformed_rows() {
    let catalog = catalog();
    let commands = commands(&[
        "book,x1,not-a-user,2024-01-01T00:00:00Z,2024-01-03T00:00:00Z,,,".to_string(),
        format!("book,x2,{ALICE},2024-01-01T00:00:00Z,,{TENT}*1,,"),
        format!("settle,x3,{ALICE},,,,CASH,BCA"),
        format!("book,x4,{ALICE},2024-01-01T00:00:00Z,2024-01-03T00:00:00Z,{TENT}x1,,"),
        book("ok", ALICE, "01", "02", &format!("{TENT}*1")),
    ]);

    let mut cmd = Command::new(cargo_bin!("gearbook"));
    cmd.arg(catalog.path()).arg(commands.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",50,PENDING"))
        .stderr(predicate::str::contains("Error reading command"));
}

#[test]
fn test_cli_missing_catalog_fails() {
    let commands = commands(&[]);

    let mut cmd = Command::new(cargo_bin!("gearbook"));
    cmd.arg("does/not/exist.csv").arg(commands.path());

    cmd.assert().failure();
}
