//! Top-level recompute flow.

use std::collections::BTreeSet;

use footprint_engine::{Calculator, CellWrite, Value};
use footprint_fwb::{decode, encode, FwbDocument};
use footprint_model::{fields, CellRef, ModelConfig, ParameterChange, WriteValue};

use crate::completion::Completion;
use crate::error::RecomputeError;
use crate::extract::{DomainParser, ModelParser};
use crate::locks::DocumentLocks;
use crate::patch::RecomputePatch;
use crate::resolver::{build_id_index, resolve_change, resolve_column};
use crate::store::WorkbookStore;
use crate::writeback::apply_change;

/// One applied change, resolved to its sheet by name. Ordered by
/// (document sheet order, row, column).
#[derive(Clone, Debug, PartialEq)]
pub struct SheetChange {
    pub sheet: String,
    pub addr: CellRef,
    pub value: Value,
}

/// Every configured range must name a sheet the workbook actually has.
fn validate_ranges(doc: &FwbDocument, model: &ModelConfig) -> Result<(), RecomputeError> {
    let mut ranges = vec![&model.parameters];
    ranges.extend(model.actions.as_ref());
    ranges.extend(model.results.as_ref());
    for range in ranges {
        if doc.sheet(&range.sheet).is_none() {
            return Err(RecomputeError::SheetNotFound(range.sheet.clone()));
        }
    }
    Ok(())
}

/// Apply a parameter batch to a decoded document, in place.
///
/// Each change is resolved against the Parameters range: unknown ids and
/// out-of-window indexes are dropped, writes aimed at formula-bearing cells
/// are skipped (computed cells are derived, never overwritten). The
/// survivors go to the calculator as one batch, so formulas depending on
/// several edited cells only ever see the final state. Every change the
/// calculator reports, written inputs and dependents alike, is coerced
/// back into the document's stored cells.
pub fn apply_model_changes(
    doc: &mut FwbDocument,
    model: &ModelConfig,
    changes: &[ParameterChange],
) -> Result<Vec<SheetChange>, RecomputeError> {
    validate_ranges(doc, model)?;

    let params = &model.parameters;
    let value_col = resolve_column(params, fields::VALUE)?;
    let sheet = doc
        .sheet(&params.sheet)
        .ok_or_else(|| RecomputeError::SheetNotFound(params.sheet.clone()))?;
    let index = build_id_index(sheet, params)?;

    let mut calc = Calculator::from_document(doc);
    let sheet_id = calc
        .sheet_id(&params.sheet)
        .ok_or_else(|| RecomputeError::SheetNotFound(params.sheet.clone()))?;

    let mut writes = Vec::new();
    for change in changes {
        let Some(addr) = resolve_change(change, params, value_col, &index) else {
            continue;
        };
        if calc.has_formula(sheet_id, addr) {
            log::debug!(
                "write to computed cell {}!{addr} skipped",
                params.sheet
            );
            continue;
        }
        let value = match change.value().to_write_value() {
            WriteValue::Number(n) => Value::Number(n),
            WriteValue::Text(s) => Value::Text(s),
        };
        writes.push(CellWrite {
            sheet: sheet_id,
            addr,
            value,
        });
    }

    let exported = calc.apply_batch(&writes);
    let applied: Vec<SheetChange> = exported
        .into_iter()
        .filter_map(|change| {
            let name = calc.sheet_name(change.sheet)?;
            Some(SheetChange {
                sheet: name.to_string(),
                addr: change.addr,
                value: change.value,
            })
        })
        .collect();

    for change in &applied {
        if let Some(sheet) = doc.sheet_mut(&change.sheet) {
            apply_change(sheet.cell_mut_or_insert(change.addr), &change.value);
        }
    }

    Ok(applied)
}

/// Storage-backed recompute service.
///
/// One instance serves many documents. Calls against the same document id
/// serialize on a keyed lock; calls against different documents run
/// concurrently.
#[derive(Debug)]
pub struct RecomputeService<S, P = ModelParser> {
    store: S,
    parser: P,
    locks: DocumentLocks,
}

impl<S: WorkbookStore> RecomputeService<S> {
    pub fn new(store: S) -> Self {
        Self::with_parser(store, ModelParser)
    }
}

impl<S: WorkbookStore, P: DomainParser> RecomputeService<S, P> {
    pub fn with_parser(store: S, parser: P) -> Self {
        Self {
            store,
            parser,
            locks: DocumentLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply a change batch to a stored document, persist the updated
    /// workbook and return the recomputed fragments.
    ///
    /// An empty batch returns an empty patch without reading storage or
    /// building a calculator; callers rely on "no changes, no side
    /// effects". A non-empty batch always re-persists the document, even
    /// when every change was dropped.
    pub fn recompute(
        &self,
        doc_id: &str,
        model: &ModelConfig,
        changes: &[ParameterChange],
    ) -> Result<RecomputePatch, RecomputeError> {
        if changes.is_empty() {
            return Ok(RecomputePatch::default());
        }

        let handle = self.locks.handle(doc_id);
        let _guard = handle.lock().expect("document lock poisoned");

        let bytes = self.store.read(doc_id)?;
        let mut doc = decode(&bytes)?;

        let applied = apply_model_changes(&mut doc, model, changes)?;

        let encoded = encode(&doc)?;
        self.store.write(doc_id, &encoded)?;

        let affected: BTreeSet<&str> = applied.iter().map(|c| c.sheet.as_str()).collect();

        let mut patch = RecomputePatch::default();
        if affected.contains(model.parameters.sheet.as_str()) {
            if let Some(sheet) = doc.sheet(&model.parameters.sheet) {
                let tree = self.parser.parse_parameters(sheet, &model.parameters);
                let Completion { rate, uncompleted } = Completion::of(&tree);
                patch.name = tree.name;
                patch.sectors = Some(tree.sectors);
                patch.completion_rate = Some(rate);
                patch.uncompleted = Some(uncompleted);
            }
        }
        for (spec, slot) in [
            (model.actions.as_ref(), &mut patch.actions),
            (model.results.as_ref(), &mut patch.results),
        ] {
            let Some(range) = spec else {
                continue;
            };
            if !affected.contains(range.sheet.as_str()) {
                continue;
            }
            if let Some(sheet) = doc.sheet(&range.sheet) {
                *slot = Some(self.parser.parse_records(sheet, range));
            }
        }

        Ok(patch)
    }
}
