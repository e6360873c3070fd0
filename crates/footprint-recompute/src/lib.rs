//! Parameter recompute service for footprint workbooks.
//!
//! This crate ties the rest of the stack together into the flow callers
//! actually invoke: read a stored workbook, apply a batch of parameter
//! changes against its Parameters range, recalculate every dependent
//! formula through [`footprint_engine`], write the results back into the
//! document with stored-type coercion, persist atomically and re-parse the
//! business ranges the batch touched.
//!
//! The entry point is [`RecomputeService`]; the in-memory half of the flow
//! is also available on its own as [`apply_model_changes`] for callers that
//! manage document bytes themselves.
//!
//! Two deliberate policies run through the whole crate: an empty change
//! batch has no side effects at all, and per-change problems (an unknown
//! id, a write aimed at a computed cell) drop that change instead of
//! failing the batch. Configuration problems, by contrast, are fatal before
//! anything is persisted.

pub mod completion;
pub mod error;
pub mod extract;
pub mod locks;
pub mod patch;
pub mod resolver;
pub mod service;
pub mod store;
pub mod writeback;

pub use completion::Completion;
pub use error::RecomputeError;
pub use extract::{DomainParser, ModelParser};
pub use locks::DocumentLocks;
pub use patch::RecomputePatch;
pub use service::{apply_model_changes, RecomputeService, SheetChange};
pub use store::{storage_key, FsWorkbookStore, MemoryWorkbookStore, WorkbookStore};
