//! End-to-end recompute flows over an in-memory model workbook.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use footprint_fwb::{decode, encode, FwbDocument, FwbSheet};
use footprint_model::{
    fields, Cell, CellRef, CellValue, ChangeValue, ModelConfig, ParamValue, ParameterChange,
    RangeSpec,
};
use footprint_recompute::{
    apply_model_changes, MemoryWorkbookStore, RecomputeError, RecomputeService, WorkbookStore,
};

fn text(s: &str) -> Cell {
    Cell::new(s.into())
}

fn number(n: f64) -> Cell {
    Cell::new(CellValue::Number(n))
}

fn boolean(b: bool) -> Cell {
    Cell::new(CellValue::Boolean(b))
}

fn set(sheet: &mut FwbSheet, row: u32, col: u32, cell: Cell) {
    sheet.set_cell(CellRef::new(row, col), cell);
}

fn heading_row(sheet: &mut FwbSheet, row: u32, id: &str, label: &str, level: f64) {
    set(sheet, row, 0, text(id));
    set(sheet, row, 1, text(label));
    set(sheet, row, 3, number(level));
}

fn param_row(sheet: &mut FwbSheet, row: u32, id: &str, label: &str) {
    set(sheet, row, 0, text(id));
    set(sheet, row, 1, text(label));
    set(sheet, row, 4, boolean(true));
    set(sheet, row, 7, boolean(true));
}

/// Questionnaire workbook: a Params sheet with two nested sectors, an
/// Actions sheet and a Results sheet whose total follows the heated
/// surface.
fn build_document() -> FwbDocument {
    let mut doc = FwbDocument::default();

    let params = doc.add_sheet("Params");
    for (col, label) in [
        "id", "label", "kind", "level", "display", "default", "value", "display_on_create",
    ]
    .iter()
    .enumerate()
    {
        set(params, 0, col as u32, text(label));
    }
    heading_row(params, 1, "general", "General", 1.0);
    param_row(params, 2, "name", "Site name");
    set(params, 2, 6, text("Alpha"));
    param_row(params, 3, "surface", "Heated surface");
    set(params, 3, 6, number(100.0));
    param_row(params, 4, "heating", "Heating vector");
    heading_row(params, 5, "energy", "Energy", 2.0);
    param_row(params, 6, "gas_kwh", "Gas use");
    param_row(params, 7, "note", "Note");
    set(params, 7, 2, text("info"));
    param_row(params, 8, "prefilled", "Prefilled");
    set(params, 8, 5, number(0.0));
    param_row(params, 9, "hidden", "Hidden");
    set(params, 9, 4, boolean(false));
    param_row(params, 10, "computed", "Computed");
    set(
        params,
        10,
        6,
        Cell::with_formula(CellValue::Number(200.0), "G4*2"),
    );
    param_row(params, 11, "denominator", "Denominator");
    set(params, 11, 6, number(4.0));
    param_row(params, 12, "ratio", "Ratio");
    set(
        params,
        12,
        6,
        Cell::with_formula(CellValue::Number(25.0), "100/G12"),
    );

    let actions = doc.add_sheet("Actions");
    set(actions, 0, 0, text("Insulate roof"));
    set(actions, 0, 1, text("building"));

    let results = doc.add_sheet("Results");
    set(results, 0, 0, text("Total"));
    set(
        results,
        0,
        1,
        Cell::with_formula(CellValue::Number(1000.0), "Params!G4*10"),
    );

    doc
}

fn config() -> ModelConfig {
    let mut params = BTreeMap::new();
    params.insert(fields::ID.to_string(), 0);
    params.insert(fields::LABEL.to_string(), 1);
    params.insert(fields::KIND.to_string(), 2);
    params.insert(fields::LEVEL.to_string(), 3);
    params.insert(fields::DISPLAY.to_string(), 4);
    params.insert(fields::DEFAULT.to_string(), 5);
    params.insert(fields::VALUE.to_string(), 6);
    params.insert(fields::DISPLAY_ON_CREATE.to_string(), 7);
    let mut parameters = RangeSpec::from_sheet_a1("Params!A1:H30", params).unwrap();
    parameters.header_rows = 1;

    let mut actions = BTreeMap::new();
    actions.insert("title".to_string(), 0);
    actions.insert("scope".to_string(), 1);

    let mut results = BTreeMap::new();
    results.insert("title".to_string(), 0);
    results.insert("total".to_string(), 1);

    ModelConfig {
        parameters,
        actions: Some(RangeSpec::from_sheet_a1("Actions!A1:B5", actions).unwrap()),
        results: Some(RangeSpec::from_sheet_a1("Results!A1:B5", results).unwrap()),
    }
}

fn seeded_service() -> RecomputeService<MemoryWorkbookStore> {
    let store = MemoryWorkbookStore::new();
    store.write("doc", &encode(&build_document()).unwrap()).unwrap();
    RecomputeService::new(store)
}

fn stored_doc<S: WorkbookStore>(service: &RecomputeService<S>) -> FwbDocument {
    decode(&service.store().read("doc").unwrap()).unwrap()
}

fn cell_of(doc: &FwbDocument, sheet: &str, a1_row: u32, col: u32) -> Cell {
    doc.sheet(sheet)
        .unwrap()
        .cell(CellRef::new(a1_row, col))
        .cloned()
        .unwrap()
}

fn by_id(id: &str, value: ChangeValue) -> ParameterChange {
    ParameterChange::ById {
        id: id.to_string(),
        value,
    }
}

/// Store wrapper counting reads and writes.
struct CountingStore {
    inner: MemoryWorkbookStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryWorkbookStore::new(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }
}

impl WorkbookStore for CountingStore {
    fn read(&self, id: &str) -> io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(id)
    }

    fn write(&self, id: &str, bytes: &[u8]) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(id, bytes)
    }

    fn copy(&self, id: &str) -> io::Result<String> {
        self.inner.copy(id)
    }

    fn delete(&self, id: &str) -> io::Result<()> {
        self.inner.delete(id)
    }
}

#[test]
fn empty_batch_has_no_side_effects() {
    let store = CountingStore::new();
    store.write("doc", &encode(&build_document()).unwrap()).unwrap();
    let service = RecomputeService::new(store);

    let patch = service.recompute("doc", &config(), &[]).unwrap();

    assert!(patch.is_empty());
    assert_eq!(service.store().reads.load(Ordering::SeqCst), 0);
    assert_eq!(service.store().writes.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_ids_leave_the_grid_unchanged() {
    let service = seeded_service();
    let before = stored_doc(&service);

    let patch = service
        .recompute("doc", &config(), &[by_id("ghost", ChangeValue::Number(999.0))])
        .unwrap();

    assert!(patch.is_empty());
    assert_eq!(stored_doc(&service), before);
}

#[test]
fn formula_targets_are_never_overwritten() {
    let service = seeded_service();

    let patch = service
        .recompute(
            "doc",
            &config(),
            &[by_id("computed", ChangeValue::Number(999.0))],
        )
        .unwrap();

    assert!(patch.is_empty());
    let cell = cell_of(&stored_doc(&service), "Params", 10, 6);
    assert_eq!(cell.formula.as_deref(), Some("G4*2"));
    assert_eq!(cell.value, CellValue::Number(200.0));
}

#[test]
fn exported_changes_cover_written_and_dependent_cells() {
    let mut doc = build_document();
    let applied =
        apply_model_changes(&mut doc, &config(), &[by_id("surface", ChangeValue::Number(50.0))])
            .unwrap();

    let summary: Vec<(&str, CellRef, String)> = applied
        .iter()
        .map(|c| (c.sheet.as_str(), c.addr, c.value.to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Params", CellRef::new(3, 6), "50".to_string()),
            ("Params", CellRef::new(10, 6), "100".to_string()),
            ("Results", CellRef::new(0, 1), "500".to_string()),
        ]
    );

    // written input
    let surface = doc.sheet("Params").unwrap().cell(CellRef::new(3, 6)).unwrap();
    assert_eq!(surface.value, CellValue::Number(50.0));
    // dependent on the same sheet keeps its formula
    let computed = doc.sheet("Params").unwrap().cell(CellRef::new(10, 6)).unwrap();
    assert_eq!(computed.value, CellValue::Number(100.0));
    assert_eq!(computed.formula.as_deref(), Some("G4*2"));
    // dependent across sheets
    let total = doc.sheet("Results").unwrap().cell(CellRef::new(0, 1)).unwrap();
    assert_eq!(total.value, CellValue::Number(500.0));
}

#[test]
fn fragments_follow_affected_sheets() {
    let service = seeded_service();

    let patch = service
        .recompute(
            "doc",
            &config(),
            &[by_id("surface", ChangeValue::Number(50.0))],
        )
        .unwrap();

    // Params and Results both changed; Actions did not.
    assert_eq!(patch.name.as_deref(), Some("Alpha"));
    assert_eq!(patch.completion_rate, Some(71));
    assert!(patch.actions.is_none());

    let sectors = patch.sectors.unwrap();
    assert_eq!(sectors.len(), 1);
    assert_eq!(sectors[0].id, "general");
    assert_eq!(sectors[0].children[0].id, "energy");

    let uncompleted: Vec<&str> = patch
        .uncompleted
        .as_deref()
        .unwrap()
        .iter()
        .map(|p| p.id.as_str())
        .collect();
    assert_eq!(uncompleted, vec!["heating", "gas_kwh"]);

    let results = patch.results.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].fields.get("total"),
        Some(&CellValue::Number(500.0))
    );
}

#[test]
fn params_only_change_leaves_other_fragments_absent() {
    let service = seeded_service();

    let patch = service
        .recompute(
            "doc",
            &config(),
            &[by_id("heating", ChangeValue::Text("gaz".to_string()))],
        )
        .unwrap();

    assert!(patch.sectors.is_some());
    assert_eq!(patch.completion_rate, Some(86));
    assert!(patch.actions.is_none());
    assert!(patch.results.is_none());

    let uncompleted: Vec<&str> = patch
        .uncompleted
        .as_deref()
        .unwrap()
        .iter()
        .map(|p| p.id.as_str())
        .collect();
    assert_eq!(uncompleted, vec!["gas_kwh"]);
}

#[test]
fn rewriting_the_same_value_produces_an_empty_patch() {
    let service = seeded_service();
    let before = stored_doc(&service);

    let patch = service
        .recompute(
            "doc",
            &config(),
            &[by_id("surface", ChangeValue::Number(100.0))],
        )
        .unwrap();

    assert!(patch.is_empty());
    assert_eq!(stored_doc(&service), before);
}

#[test]
fn divide_by_zero_writes_the_error_code() {
    let service = seeded_service();

    let patch = service
        .recompute(
            "doc",
            &config(),
            &[by_id("denominator", ChangeValue::Number(0.0))],
        )
        .unwrap();

    let ratio = cell_of(&stored_doc(&service), "Params", 12, 6);
    assert_eq!(ratio.value, CellValue::Error(0x07));
    assert_eq!(ratio.display.as_deref(), Some("#DIV/0!"));
    assert_eq!(ratio.formula.as_deref(), Some("100/G12"));

    // The erroring cell surfaces its literal in the parsed tree.
    let sectors = patch.sectors.unwrap();
    let ratio_param = sectors[0].children[0]
        .parameters
        .iter()
        .find(|p| p.id == "ratio")
        .unwrap();
    assert_eq!(
        ratio_param.value,
        ParamValue::Text("#DIV/0!".to_string())
    );
}

#[test]
fn dates_and_lists_are_written_as_text() {
    let service = seeded_service();

    let patch = service
        .recompute(
            "doc",
            &config(),
            &[
                by_id(
                    "heating",
                    ChangeValue::Date(NaiveDate::from_ymd_opt(2023, 1, 9).unwrap()),
                ),
                by_id(
                    "gas_kwh",
                    ChangeValue::List(vec!["gaz".to_string(), "fioul".to_string()]),
                ),
            ],
        )
        .unwrap();

    let doc = stored_doc(&service);
    assert_eq!(
        cell_of(&doc, "Params", 4, 6).value,
        CellValue::Text("09/01/2023".to_string())
    );
    assert_eq!(
        cell_of(&doc, "Params", 6, 6).value,
        CellValue::Text("gaz,fioul".to_string())
    );

    // Every fillable parameter now carries an answer.
    assert_eq!(patch.completion_rate, Some(100));
    assert_eq!(patch.uncompleted.as_deref(), Some(&[][..]));
}

#[test]
fn by_index_changes_write_the_value_column() {
    let service = seeded_service();

    // data row 2 of the range is the surface row
    let change = ParameterChange::ByIndex {
        row: 2,
        value: ChangeValue::Number(75.0),
    };
    service.recompute("doc", &config(), &[change]).unwrap();

    let doc = stored_doc(&service);
    assert_eq!(cell_of(&doc, "Params", 3, 6).value, CellValue::Number(75.0));
    assert_eq!(
        cell_of(&doc, "Params", 10, 6).value,
        CellValue::Number(150.0)
    );
}

#[test]
fn missing_configuration_is_fatal_and_persists_nothing() {
    let store = CountingStore::new();
    store.write("doc", &encode(&build_document()).unwrap()).unwrap();
    let service = RecomputeService::new(store);
    let change = by_id("surface", ChangeValue::Number(50.0));

    let mut bad_sheet = config();
    bad_sheet.parameters.sheet = "Nope".to_string();
    let err = service.recompute("doc", &bad_sheet, &[change.clone()]).unwrap_err();
    assert!(matches!(err, RecomputeError::SheetNotFound(s) if s == "Nope"));

    let mut bad_fields = config();
    bad_fields.parameters.fields.remove(fields::VALUE);
    let err = service.recompute("doc", &bad_fields, &[change]).unwrap_err();
    assert!(matches!(
        err,
        RecomputeError::MissingField { field: "value", .. }
    ));

    assert_eq!(service.store().writes.load(Ordering::SeqCst), 1);
}

#[test]
fn prefixed_ids_reach_the_same_document() {
    let service = seeded_service();

    service
        .recompute(
            "legacy:doc",
            &config(),
            &[by_id("heating", ChangeValue::Text("bois".to_string()))],
        )
        .unwrap();

    assert_eq!(
        cell_of(&stored_doc(&service), "Params", 4, 6).value,
        CellValue::Text("bois".to_string())
    );
}
