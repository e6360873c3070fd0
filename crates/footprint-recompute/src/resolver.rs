//! Resolution of parameter changes to grid addresses.

use std::collections::HashMap;

use footprint_fwb::FwbSheet;
use footprint_model::{fields, CellRef, CellValue, ParameterChange, RangeSpec};

use crate::error::RecomputeError;

/// Absolute column index of a required field. A field the range does not
/// declare, or that falls outside its window, is a configuration error and
/// aborts the batch.
pub fn resolve_column(range: &RangeSpec, field: &'static str) -> Result<u32, RecomputeError> {
    range
        .column(field)
        .ok_or_else(|| RecomputeError::MissingField {
            sheet: range.sheet.clone(),
            field,
        })
}

/// Render an id-column cell into a lookup key. Text ids are used exactly as
/// written; numeric ids use their plain decimal rendering.
pub(crate) fn id_key(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Text(s) if !s.is_empty() => Some(s.clone()),
        CellValue::Number(n) | CellValue::Date(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Scan the id column of the parameters range top to bottom into an
/// id → absolute-row table.
///
/// Later duplicates overwrite earlier rows, so a duplicated id addresses
/// its last occurrence. That mirrors how the table has always been built;
/// models relying on "first match" were never given that guarantee.
pub fn build_id_index(
    sheet: &FwbSheet,
    range: &RangeSpec,
) -> Result<HashMap<String, u32>, RecomputeError> {
    let id_col = resolve_column(range, fields::ID)?;
    let mut index = HashMap::new();
    for row in range.data_rows() {
        if let Some(cell) = sheet.cell(CellRef::new(row, id_col)) {
            if let Some(key) = id_key(&cell.value) {
                index.insert(key, row);
            }
        }
    }
    Ok(index)
}

/// Resolve one change to the value cell it writes.
///
/// `None` drops the change: unknown ids and row indexes outside the range
/// window are best-effort no-ops, so a caller holding a stale model (ids
/// renamed, rows removed) degrades instead of aborting the whole batch.
pub fn resolve_change(
    change: &ParameterChange,
    range: &RangeSpec,
    value_col: u32,
    index: &HashMap<String, u32>,
) -> Option<CellRef> {
    match change {
        ParameterChange::ByIndex { row, .. } => {
            match range.first_data_row().checked_add(*row) {
                Some(abs) if abs <= range.window.end.row => Some(CellRef::new(abs, value_col)),
                _ => {
                    log::debug!(
                        "row index {row} falls outside {}!{}, change dropped",
                        range.sheet,
                        range.window
                    );
                    None
                }
            }
        }
        ParameterChange::ById { id, .. } => match index.get(id) {
            Some(&row) => Some(CellRef::new(row, value_col)),
            None => {
                log::debug!("unknown parameter id {id:?}, change dropped");
                None
            }
        },
    }
}
