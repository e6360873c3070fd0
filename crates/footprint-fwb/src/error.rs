use std::io;

use thiserror::Error;

/// FWB codec failures.
///
/// Every variant is fatal for the call that hit it: a document either
/// decodes completely or not at all, and encoding never emits a partial
/// stream.
#[derive(Debug, Error)]
pub enum FwbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid FWB: unexpected end of record")]
    UnexpectedEof,
    #[error("invalid FWB: stream does not start with a book header")]
    MissingBookHeader,
    #[error("unsupported FWB version {0}")]
    UnsupportedVersion(u16),
    #[error("invalid FWB: record {0:#06x} not allowed here")]
    UnexpectedRecord(u32),
    #[error("invalid FWB: trailing bytes in record {0:#06x}")]
    TrailingRecordBytes(u32),
    #[error("invalid FWB: data after the end of the book")]
    TrailingData,
    #[error("invalid FWB: duplicate sheet name {0:?}")]
    DuplicateSheet(String),
    #[error("invalid FWB: cell record before any row")]
    CellOutsideRow,
    #[error("invalid FWB: cell coordinates out of bounds")]
    CellOutOfBounds,
    #[error("invalid FWB: unknown cell flags {0:#04x}")]
    InvalidCellFlags(u8),
    #[error("invalid FWB: name scope {0} does not refer to a sheet")]
    InvalidNameScope(u32),
    #[error("cannot encode name scoped to unknown sheet {0:?}")]
    UnknownScopeSheet(String),
}
