//! CLI Integration Tests
//!
//! Runs the bid-recon binary end to end: import, add-return, compare, export.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use bid_recon::config::load_preset;
use bid_recon::types::ConfigScope;
use predicates::prelude::*;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

enum Cell<'a> {
    T(&'a str),
    N(f64),
}

use Cell::{N, T};

fn write_sheet(path: &Path, sheet_name: &str, rows: &[Vec<Cell<'_>>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name).unwrap();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            match cell {
                T(s) => sheet.write_string(r as u32, c as u16, *s).unwrap(),
                N(v) => sheet.write_number(r as u32, c as u16, *v).unwrap(),
            };
        }
    }
    workbook.save(path).unwrap();
}

fn project_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("computo.xlsx");
    write_sheet(
        &path,
        "Computo",
        &[
            vec![T("Computo metrico")],
            vec![T("Codice"), T("Descrizione"), T("U.M."), T("Quantità"), T("Prezzo unitario")],
            vec![T("A100"), T("Tubo in acciaio zincato DN50"), T("m"), N(10.0), N(100.0)],
            vec![T("B200"), T("Valvola a sfera in ottone"), T("nr"), N(2.0), N(50.0)],
            vec![T("C300"), T("Raccordo a T in ghisa"), T("nr"), N(4.0), N(20.0)],
        ],
    );
    path
}

fn acme_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("offerta_acme.xlsx");
    write_sheet(
        &path,
        "Offerta",
        &[
            vec![T("Cod."), T("Descrizione"), T("Q.tà"), T("Prezzo €")],
            vec![T("A100"), T("Tubo in acciaio zincato DN50"), N(10.0), N(90.0)],
            vec![T("B200"), T("Valvola a sfera in ottone"), N(2.0), N(55.0)],
            vec![T("C300"), T("Raccordo a T in ghisa"), N(5.0), N(20.0)],
        ],
    );
    path
}

/// Same headers as Acme's return, shifted right by a row-number column.
fn beta_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("offerta_beta.xlsx");
    write_sheet(
        &path,
        "offerta",
        &[
            vec![T("N."), T("Cod."), T("Descrizione"), T("Q.tà"), T("Prezzo €")],
            vec![N(1.0), T("A100"), T("Tubo in acciaio zincato DN50"), N(10.0), N(110.0)],
            vec![N(2.0), T("B200"), T("Valvola a sfera in ottone"), N(2.0), N(45.0)],
        ],
    );
    path
}

fn bid_recon() -> Command {
    let mut cmd = Command::cargo_bin("bid-recon").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("BID_RECON_CONFIG");
    cmd
}

fn import_project(dir: &Path, project: Option<&str>) -> PathBuf {
    let dataset = dir.join("tender.yaml");
    let mut cmd = bid_recon();
    cmd.arg("import")
        .arg(project_workbook(dir))
        .arg(&dataset)
        .arg("--name")
        .arg("Hospital wing");
    if let Some(p) = project {
        cmd.arg("--project").arg(p);
    }
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Import Complete"));
    dataset
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    bid_recon()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bid-recon"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    bid_recon()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bid-recon"));
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_profile_shows_mapping() {
    let dir = TempDir::new().unwrap();
    bid_recon()
        .arg("profile")
        .arg(project_workbook(dir.path()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Prezzo unitario"))
        .stdout(predicate::str::contains("Proposed mapping"));
}

#[test]
fn test_profile_json() {
    let dir = TempDir::new().unwrap();
    let output = bid_recon()
        .arg("profile")
        .arg(project_workbook(dir.path()))
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["header_row"], 1);
    assert_eq!(json["mapping"]["code_columns"][0], "A");
    assert_eq!(json["mapping"]["description_columns"][0], "B");
    assert_eq!(json["mapping"]["price_column"], "E");
    assert_eq!(json["mapping"]["quantity_column"], "D");
    assert!(json["mapping"]["progressive_column"].is_null());
}

#[test]
fn test_profile_corrupt_workbook_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"not a workbook").unwrap();
    bid_recon()
        .arg("profile")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Workbook error"));
}

// ═══════════════════════════════════════════════════════════════════════════
// IMPORT → ADD-RETURN → COMPARE → EXPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_full_workflow() {
    let dir = TempDir::new().unwrap();
    let dataset = import_project(dir.path(), None);
    let content = std::fs::read_to_string(&dataset).unwrap();
    assert!(content.contains("name: Hospital wing"));
    assert!(content.contains("code: C300"));

    let preset = dir.path().join("acme_preset.yaml");
    bid_recon()
        .arg("add-return")
        .arg(&dataset)
        .arg(acme_workbook(dir.path()))
        .args(["--company", "Acme", "--round", "1"])
        .arg("--save-preset")
        .arg(&preset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme (Round 1)"))
        .stdout(predicate::str::contains("Return Added"));
    assert!(preset.exists());
    assert!(dir.path().join("tender.yaml.bak").exists());

    // Beta's columns are shifted; the label-based preset still lines them up.
    bid_recon()
        .arg("add-return")
        .arg(&dataset)
        .arg(beta_workbook(dir.path()))
        .args(["--company", "Beta"])
        .arg("--preset")
        .arg(&preset)
        .assert()
        .success();

    let output = bid_recon()
        .arg("compare")
        .arg(&dataset)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let summary = &json["summary"];
    assert_eq!(summary["rows"], 3);
    assert_eq!(summary["priced_rows"], 3);
    assert_eq!(summary["quantity_mismatch_rows"], 1);
    assert_eq!(summary["companies"][0]["total_amount"], 1110.0);
    assert_eq!(summary["companies"][1]["total_amount"], 1190.0);
    assert_eq!(summary["companies"][1]["missing_items"], 1);
    assert_eq!(summary["lowest_bidder"], "Acme (Round 1)");

    let first = &json["rows"][0];
    assert_eq!(first["stats"]["mean"], 100.0);
    assert_eq!(first["companies"][0]["delta_vs_project_pct"], -10.0);

    bid_recon()
        .arg("compare")
        .arg(&dataset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Lowest complete bid"))
        .stdout(predicate::str::contains("Acme (Round 1)"));

    let xlsx = dir.path().join("confronto.xlsx");
    bid_recon()
        .arg("export")
        .arg(&dataset)
        .arg(&xlsx)
        .assert()
        .success()
        .stdout(predicate::str::contains("Export Complete"));
    assert!(xlsx.exists());
}

#[test]
fn test_compare_unknown_company_fails() {
    let dir = TempDir::new().unwrap();
    let dataset = import_project(dir.path(), None);
    bid_recon()
        .arg("compare")
        .arg(&dataset)
        .args(["--company", "Zeta"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Zeta"));
}

#[test]
fn test_project_scope_without_project_is_rejected() {
    let dir = TempDir::new().unwrap();
    let dataset = import_project(dir.path(), None);
    let before = std::fs::read_to_string(&dataset).unwrap();
    let preset = dir.path().join("preset.yaml");

    bid_recon()
        .arg("add-return")
        .arg(&dataset)
        .arg(acme_workbook(dir.path()))
        .args(["--company", "Acme", "--scope", "project"])
        .arg("--save-preset")
        .arg(&preset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Scope error"));

    assert!(!preset.exists());
    assert_eq!(std::fs::read_to_string(&dataset).unwrap(), before);
}

#[test]
fn test_project_scope_with_project_is_saved() {
    let dir = TempDir::new().unwrap();
    let dataset = import_project(dir.path(), Some("Hospital wing"));
    let preset = dir.path().join("preset.yaml");

    bid_recon()
        .arg("add-return")
        .arg(&dataset)
        .arg(acme_workbook(dir.path()))
        .args(["--company", "Acme", "--scope", "project"])
        .arg("--save-preset")
        .arg(&preset)
        .assert()
        .success();

    let saved = load_preset(&preset).unwrap();
    assert_eq!(saved.scope, ConfigScope::Project);
    assert_eq!(saved.company.as_deref(), Some("Acme"));
    assert_eq!(saved.price_column.as_deref(), Some("Prezzo €"));
    assert_eq!(saved.code_columns.as_deref(), Some("Cod."));
}

#[test]
fn test_preset_sheet_missing_is_reported() {
    let dir = TempDir::new().unwrap();
    let dataset = import_project(dir.path(), None);
    let preset = dir.path().join("preset.yaml");
    std::fs::write(&preset, "name: Acme\nsheet_name: Offerta finale\nprice_column: Prezzo €\n").unwrap();

    bid_recon()
        .arg("add-return")
        .arg(&dataset)
        .arg(acme_workbook(dir.path()))
        .args(["--company", "Acme"])
        .arg("--preset")
        .arg(&preset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Offerta finale"));
}
