mod common;

use assert_cmd::Command;
use common::{INVOICE_HEADERS, TestWorkspace, zip_archive};
use predicates::prelude::*;
use predicates::str::contains;

fn invoices_zip(workspace: &TestWorkspace) -> String {
    let archive = zip_archive(&[
        ("nfe/NFe_Cabecalho.csv", INVOICE_HEADERS.as_bytes()),
        ("nfe/invoices.csv", b"uf,valor\nSP,10\nRJ,x\nSP,2.5\n"),
    ]);
    workspace
        .write_bytes("notas.zip", &archive)
        .to_str()
        .expect("utf-8 path")
        .to_string()
}

#[test]
fn inspect_prints_load_summary_and_tables() {
    let workspace = TestWorkspace::new();
    let archive = invoices_zip(&workspace);
    Command::cargo_bin("drive-tables")
        .expect("binary exists")
        .args(["inspect", "--archive", &archive])
        .assert()
        .success()
        .stdout(contains("nfe_cabecalho.csv"))
        .stdout(contains("2 file(s): 2 loaded, 0 failed, 8 row(s)"))
        .stdout(contains("uf, valor"));
}

#[test]
fn query_prints_json_result() {
    let workspace = TestWorkspace::new();
    let archive = invoices_zip(&workspace);
    let output = Command::cargo_bin("drive-tables")
        .expect("binary exists")
        .args([
            "query",
            "--archive",
            &archive,
            "--table",
            "invoices",
            "--operation",
            "group_by",
            "--column",
            "uf",
        ])
        .output()
        .expect("run query");
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(result["table"], "invoices.csv");
    assert_eq!(result["result"], "groups");
    assert_eq!(result["groups"][0]["key"], "SP");
    assert_eq!(result["groups"][0]["count"], 2);
    assert_eq!(result["groups"][0]["total_value"], 12.5);
}

#[test]
fn query_reports_missing_table_with_available_names() {
    let workspace = TestWorkspace::new();
    let archive = invoices_zip(&workspace);
    Command::cargo_bin("drive-tables")
        .expect("binary exists")
        .args([
            "query",
            "--archive",
            &archive,
            "--table",
            "estoque",
            "--operation",
            "count",
        ])
        .assert()
        .failure()
        .stderr(contains("Table 'estoque' not found").and(contains("invoices.csv")));
}

#[test]
fn unknown_operation_fails_cleanly() {
    let workspace = TestWorkspace::new();
    let archive = invoices_zip(&workspace);
    Command::cargo_bin("drive-tables")
        .expect("binary exists")
        .args([
            "query",
            "--archive",
            &archive,
            "--table",
            "invoices",
            "--operation",
            "median",
        ])
        .assert()
        .failure()
        .stderr(contains("Unknown operation 'median'"));
}

#[test]
fn missing_archive_is_reported() {
    let workspace = TestWorkspace::new();
    let missing = workspace.path().join("absent.zip");
    Command::cargo_bin("drive-tables")
        .expect("binary exists")
        .args(["inspect", "--archive", missing.to_str().expect("utf-8 path")])
        .assert()
        .failure()
        .stderr(contains("Reading archive"));
}
