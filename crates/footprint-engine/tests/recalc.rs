//! End-to-end recalculation over documents built in memory.

use footprint_engine::{Calculator, CellWrite, ErrorKind, ExportedChange, Value};
use footprint_fwb::FwbDocument;
use footprint_model::{Cell, CellRef, CellValue, NamedExpression};
use pretty_assertions::assert_eq;

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

fn num(n: f64) -> Cell {
    Cell::new(CellValue::Number(n))
}

fn formula(cached: f64, text: &str) -> Cell {
    Cell::with_formula(CellValue::Number(cached), text)
}

fn build_doc(sheets: &[&str]) -> FwbDocument {
    let mut doc = FwbDocument::default();
    for name in sheets {
        doc.add_sheet(*name);
    }
    doc
}

fn put(doc: &mut FwbDocument, sheet: &str, a1: &str, cell: Cell) {
    doc.sheet_mut(sheet).unwrap().set_cell(at(a1), cell);
}

fn write(sheet: usize, a1: &str, value: Value) -> CellWrite {
    CellWrite {
        sheet,
        addr: at(a1),
        value,
    }
}

fn change(sheet: usize, a1: &str, value: Value) -> ExportedChange {
    ExportedChange {
        sheet,
        addr: at(a1),
        value,
    }
}

#[test]
fn loading_refreshes_stale_cached_values() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(5.0));
    put(&mut doc, "Feuil1", "B1", formula(999.0, "A1*2"));

    let calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("B1")), Value::Number(10.0));
    assert!(calc.has_formula(0, at("B1")));
    assert!(!calc.has_formula(0, at("A1")));
}

#[test]
fn writes_propagate_through_formula_chains() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(2.0));
    put(&mut doc, "Feuil1", "B1", formula(20.0, "A1*10"));
    put(&mut doc, "Feuil1", "C1", formula(21.0, "B1+1"));

    let mut calc = Calculator::from_document(&doc);
    let changes = calc.apply_batch(&[write(0, "A1", Value::Number(5.0))]);

    assert_eq!(
        changes,
        vec![
            change(0, "A1", Value::Number(5.0)),
            change(0, "B1", Value::Number(50.0)),
            change(0, "C1", Value::Number(51.0)),
        ]
    );
    assert_eq!(calc.value_at(0, at("C1")), Value::Number(51.0));
}

#[test]
fn empty_batch_reports_nothing() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(1.0));

    let mut calc = Calculator::from_document(&doc);
    assert_eq!(calc.apply_batch(&[]), vec![]);
}

#[test]
fn unchanged_results_are_not_reported() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(5.0));
    put(&mut doc, "Feuil1", "B1", formula(10.0, "A1*2"));
    // MIN clamps, so the result sticks at 10 for any A1 above 5.
    put(&mut doc, "Feuil1", "C1", formula(10.0, "MIN(B1,10)"));

    let mut calc = Calculator::from_document(&doc);
    let changes = calc.apply_batch(&[write(0, "A1", Value::Number(5.0))]);
    assert_eq!(changes, vec![]);

    let changes = calc.apply_batch(&[write(0, "A1", Value::Number(8.0))]);
    assert_eq!(
        changes,
        vec![
            change(0, "A1", Value::Number(8.0)),
            change(0, "B1", Value::Number(16.0)),
        ]
    );
}

#[test]
fn cycles_degrade_to_calc_errors() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", formula(0.0, "B1+1"));
    put(&mut doc, "Feuil1", "B1", formula(0.0, "A1+1"));
    put(&mut doc, "Feuil1", "D1", formula(2.0, "C1*2"));

    let mut calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("A1")), Value::Error(ErrorKind::Calc));
    assert_eq!(calc.value_at(0, at("B1")), Value::Error(ErrorKind::Calc));
    // The healthy part of the workbook still recalculates.
    let changes = calc.apply_batch(&[write(0, "C1", Value::Number(3.0))]);
    assert_eq!(
        changes,
        vec![
            change(0, "C1", Value::Number(3.0)),
            change(0, "D1", Value::Number(6.0)),
        ]
    );
}

#[test]
fn defined_names_join_the_dependency_graph() {
    let mut doc = build_doc(&["Params", "Résultats"]);
    doc.names
        .push(NamedExpression::global("taux_co2", "Params!B4"));
    put(&mut doc, "Params", "B4", num(3.0));
    put(&mut doc, "Résultats", "B2", formula(0.0, "taux_co2*2"));

    let mut calc = Calculator::from_document(&doc);
    let results = calc.sheet_id("Résultats").unwrap();
    let params = calc.sheet_id("Params").unwrap();
    assert_eq!(calc.value_at(results, at("B2")), Value::Number(6.0));

    let changes = calc.apply_batch(&[write(params, "B4", Value::Number(5.0))]);
    assert_eq!(
        changes,
        vec![
            change(params, "B4", Value::Number(5.0)),
            change(results, "B2", Value::Number(10.0)),
        ]
    );
}

#[test]
fn sheet_scoped_names_shadow_global_ones() {
    let mut doc = build_doc(&["S1", "S2"]);
    doc.names.push(NamedExpression::global("rate", "S1!A1"));
    doc.names.push(NamedExpression::scoped("rate", "S2", "S2!A1"));
    put(&mut doc, "S1", "A1", num(1.0));
    put(&mut doc, "S2", "A1", num(2.0));
    put(&mut doc, "S1", "C1", formula(0.0, "rate"));
    put(&mut doc, "S2", "C1", formula(0.0, "rate"));

    let calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("C1")), Value::Number(1.0));
    assert_eq!(calc.value_at(1, at("C1")), Value::Number(2.0));
}

#[test]
fn writing_over_a_formula_cell_drops_the_formula() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(2.0));
    put(&mut doc, "Feuil1", "B1", formula(4.0, "A1*2"));

    let mut calc = Calculator::from_document(&doc);
    let changes = calc.apply_batch(&[write(0, "B1", Value::Number(7.0))]);
    assert_eq!(changes, vec![change(0, "B1", Value::Number(7.0))]);
    assert!(!calc.has_formula(0, at("B1")));

    // B1 no longer follows A1.
    let changes = calc.apply_batch(&[write(0, "A1", Value::Number(100.0))]);
    assert_eq!(changes, vec![change(0, "A1", Value::Number(100.0))]);
    assert_eq!(calc.value_at(0, at("B1")), Value::Number(7.0));
}

#[test]
fn sheet_lookup_is_case_insensitive() {
    let mut doc = build_doc(&["Params", "Résultats"]);
    put(&mut doc, "Params", "A1", num(4.0));
    put(&mut doc, "Résultats", "B1", formula(0.0, "params!A1+1"));

    let calc = Calculator::from_document(&doc);
    assert_eq!(calc.sheet_id("RÉSULTATS"), Some(1));
    assert_eq!(calc.value_at(1, at("B1")), Value::Number(5.0));
}

#[test]
fn unknown_sheet_reference_evaluates_to_ref_error() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "B1", formula(0.0, "Nulle!A1+1"));

    let calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("B1")), Value::Error(ErrorKind::Ref));
}

#[test]
fn unparseable_formula_evaluates_to_name_error() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "B1", formula(0.0, "SUM(("));

    let calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("B1")), Value::Error(ErrorKind::Name));
    // The formula text survives so the cell stays protected from writes.
    assert!(calc.has_formula(0, at("B1")));
}

#[test]
fn errors_flow_through_dependents_and_clear_on_fix() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(10.0));
    put(&mut doc, "Feuil1", "A2", num(0.0));
    put(&mut doc, "Feuil1", "B1", formula(0.0, "A1/A2"));
    put(&mut doc, "Feuil1", "C1", formula(0.0, "B1+1"));

    let mut calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("B1")), Value::Error(ErrorKind::Div0));
    assert_eq!(calc.value_at(0, at("C1")), Value::Error(ErrorKind::Div0));

    let changes = calc.apply_batch(&[write(0, "A2", Value::Number(4.0))]);
    assert_eq!(
        changes,
        vec![
            change(0, "A2", Value::Number(4.0)),
            change(0, "B1", Value::Number(2.5)),
            change(0, "C1", Value::Number(3.5)),
        ]
    );
}

#[test]
fn range_aggregates_see_writes_into_blank_cells() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(1.0));
    put(&mut doc, "Feuil1", "A2", num(2.0));
    put(&mut doc, "Feuil1", "B1", formula(0.0, "SUM(A1:A4)"));

    let mut calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("B1")), Value::Number(3.0));

    // A3 was blank and part of the summed range.
    let changes = calc.apply_batch(&[write(0, "A3", Value::Number(10.0))]);
    assert_eq!(
        changes,
        vec![
            change(0, "A3", Value::Number(10.0)),
            change(0, "B1", Value::Number(13.0)),
        ]
    );
}

#[test]
fn batch_writes_apply_together() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", num(1.0));
    put(&mut doc, "Feuil1", "A2", num(1.0));
    put(&mut doc, "Feuil1", "B1", formula(2.0, "A1+A2"));

    let mut calc = Calculator::from_document(&doc);
    let changes = calc.apply_batch(&[
        write(0, "A1", Value::Number(3.0)),
        write(0, "A2", Value::Number(4.0)),
    ]);
    // B1 recalculates once, against both new inputs.
    assert_eq!(
        changes,
        vec![
            change(0, "A1", Value::Number(3.0)),
            change(0, "A2", Value::Number(4.0)),
            change(0, "B1", Value::Number(7.0)),
        ]
    );
}

#[test]
fn text_and_boolean_inputs_participate() {
    let mut doc = build_doc(&["Feuil1"]);
    put(&mut doc, "Feuil1", "A1", Cell::new(CellValue::from("12")));
    put(&mut doc, "Feuil1", "B1", formula(0.0, "A1*2"));
    put(&mut doc, "Feuil1", "C1", formula(0.0, "IF(D1,B1,0)"));

    let mut calc = Calculator::from_document(&doc);
    assert_eq!(calc.value_at(0, at("B1")), Value::Number(24.0));
    assert_eq!(calc.value_at(0, at("C1")), Value::Number(0.0));

    let changes = calc.apply_batch(&[write(0, "D1", Value::Bool(true))]);
    assert_eq!(
        changes,
        vec![
            change(0, "C1", Value::Number(24.0)),
            change(0, "D1", Value::Bool(true)),
        ]
    );
}
