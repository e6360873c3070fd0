//! `footprint-model` defines the data structures shared across the recompute
//! stack.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the FWB codec (cells, addresses, error codes)
//! - the calculation engine (addresses, named expressions)
//! - the recompute orchestrator (business ranges, parameter changes, domain
//!   tree) and its callers via `serde` (JSON-safe schema)

mod address;
mod cell;
mod changes;
mod dates;
mod domain;
pub mod errors;
pub mod formula_text;
mod names;
mod ranges;

pub use address::{
    parse_sheet_range, A1ParseError, CellRef, Range, RangeParseError, MAX_COLS, MAX_ROWS,
};
pub use cell::{Cell, CellValue};
pub use changes::{ChangeValue, ParameterChange, WriteValue};
pub use dates::{
    date_from_serial, date_write_text, serial_from_date, DATE_TEXT_FORMAT, TEXT_MARKER,
};
pub use domain::{ParamKind, ParamValue, Parameter, ParameterTree, RangeRecord, Sector};
pub use formula_text::{display_formula_text, normalize_formula_text};
pub use names::NamedExpression;
pub use ranges::{fields, ModelConfig, RangeSpec};
