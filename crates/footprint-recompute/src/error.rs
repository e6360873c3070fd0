use std::io;

use thiserror::Error;

use footprint_fwb::FwbError;

/// Failures that abort a recompute call.
///
/// All of these surface before anything is persisted: storage writes happen
/// only after the document decoded, the batch applied and the updated
/// document encoded, so a caller either gets a fully persisted workbook or
/// an untouched one.
#[derive(Debug, Error)]
pub enum RecomputeError {
    /// Workbook storage could not serve or persist the document bytes.
    #[error("workbook storage: {0}")]
    Storage(#[from] io::Error),

    /// The stored bytes did not decode, or the updated document did not
    /// encode.
    #[error(transparent)]
    Codec(#[from] FwbError),

    /// A configured business range names a sheet the workbook does not
    /// have.
    #[error("sheet {0:?} not found in workbook")]
    SheetNotFound(String),

    /// A business range does not declare, or places outside its window, a
    /// field the recompute flow requires.
    #[error("range on sheet {sheet:?} has no usable {field:?} column")]
    MissingField { sheet: String, field: &'static str },
}
