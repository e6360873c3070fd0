//! Formula recalculation engine for footprint workbooks.
//!
//! The engine loads a decoded [`footprint_fwb::FwbDocument`], parses the
//! canonical formula dialect into an AST, tracks cell-level dependencies and
//! re-evaluates affected formulas when inputs change. Recalculation happens
//! level by level over the dependency graph; independent cells within a
//! level are evaluated on a thread pool when the `parallel` feature is
//! enabled (the default). Reference cycles do not fail a batch: cells stuck
//! on a cycle evaluate to `#CALC!`.
//!
//! The entry point is [`Calculator`]: build one with
//! [`Calculator::from_document`], then feed it write batches through
//! [`Calculator::apply_batch`] and observe the reported changes.

pub mod ast;
pub mod engine;
pub mod eval;
pub mod functions;
mod parallel;
pub mod parser;
pub mod value;

pub use engine::{Calculator, CellKey, CellWrite, ExportedChange, SheetId};
pub use parser::{parse_formula, FormulaParseError};
pub use value::{ErrorKind, Value};
