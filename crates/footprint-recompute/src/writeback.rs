//! Engine results back into stored cells.
//!
//! Stored cells keep a type tag, and the tag a cell had before a rewrite
//! tells us how its author meant it to be read. The rules here preserve
//! that tag wherever the new value is compatible with it: a Number cell
//! stays Number when the engine hands back numeric text, a Boolean cell
//! absorbs numbers as truth values, a Date cell keeps its Date tag across
//! new serial values. Only an incompatible value flips the tag.

use footprint_engine::Value;
use footprint_model::{Cell, CellValue};

/// Apply one engine-reported change onto a stored cell.
///
/// Touches `value` and `display` only: the formula is the reason the cell
/// changed, the comment belongs to the author, the style to the sheet. Any
/// cached display string described the previous value and is dropped;
/// errors store their canonical literal as the new display.
pub fn apply_change(cell: &mut Cell, new_value: &Value) {
    if let Value::Error(kind) = new_value {
        cell.value = CellValue::Error(kind.to_stored_code());
        cell.display = Some(kind.as_code().to_string());
        return;
    }
    cell.display = None;
    if is_cleared(new_value) {
        // The entry itself stays, so row shape survives for re-extraction.
        cell.value = CellValue::Empty;
        return;
    }
    cell.value = coerce(&cell.value, new_value);
}

/// Blank results and empty text both clear the target.
fn is_cleared(value: &Value) -> bool {
    match value {
        Value::Blank => true,
        Value::Text(s) => s.is_empty(),
        _ => false,
    }
}

fn coerce(previous: &CellValue, new_value: &Value) -> CellValue {
    // Booleans carry their own tag no matter what the cell used to hold.
    if let Value::Bool(b) = new_value {
        return CellValue::Boolean(*b);
    }
    match previous {
        // No previous entry, or a resolved error: the runtime type decides.
        CellValue::Empty | CellValue::Error(_) => runtime_tag(new_value),
        CellValue::Number(_) | CellValue::Text(_) => match numeric_of(new_value) {
            Some(n) => CellValue::Number(n),
            None => runtime_tag(new_value),
        },
        CellValue::Boolean(_) => match numeric_of(new_value) {
            Some(n) => CellValue::Boolean(n != 0.0),
            None => runtime_tag(new_value),
        },
        CellValue::Date(_) => match numeric_of(new_value) {
            Some(serial) => CellValue::Date(serial),
            None => runtime_tag(new_value),
        },
    }
}

/// The tag a value gets when the previous tag has no say.
fn runtime_tag(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => CellValue::Number(*n),
        Value::Text(s) => CellValue::Text(s.clone()),
        Value::Bool(b) => CellValue::Boolean(*b),
        // Handled before tag coercion is reached.
        Value::Blank | Value::Error(_) => CellValue::Empty,
    }
}

/// Numbers, and text that reads as a number.
fn numeric_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(_) => value.coerce_to_number().ok(),
        _ => None,
    }
}
