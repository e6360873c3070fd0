use assert_cmd::prelude::*;
use std::process::Command;

use footprint_fwb::{encode, FwbDocument};
use footprint_model::{Cell, CellRef, CellValue, NamedExpression};

fn fixture() -> FwbDocument {
    let mut doc = FwbDocument::default();
    doc.names
        .push(NamedExpression::global("taux_co2", "Params!B4"));
    let sheet = doc.add_sheet("Params");
    sheet.set_cell(
        CellRef::new(0, 0),
        Cell::new(CellValue::Text("surface".to_string())),
    );
    sheet.set_cell(
        CellRef::new(3, 1),
        Cell::with_formula(CellValue::Number(241.0), "A1*2"),
    );
    doc
}

#[test]
fn fwb_dump_prints_names_cells_and_formulas() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simple.fwb");
    std::fs::write(&path, encode(&fixture()).unwrap()).unwrap();

    let assert = Command::new(assert_cmd::cargo::cargo_bin!("fwb_dump"))
        .arg(&path)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains("name taux_co2 = Params!B4"), "stdout:\n{stdout}");
    assert!(stdout.contains("\"Params\""), "stdout:\n{stdout}");
    assert!(stdout.contains("B4 = 241  =A1*2"), "stdout:\n{stdout}");
}

#[test]
fn fwb_dump_rejects_garbage_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not.fwb");
    std::fs::write(&path, b"definitely not a workbook").unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("fwb_dump"))
        .arg(&path)
        .assert()
        .failure();
}
