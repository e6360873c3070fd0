//! `footprint-fwb` reads and writes the FWB binary workbook container.
//!
//! The codec is lossless in both directions:
//! - decoding captures every populated cell with its original type tag,
//!   canonicalized formula text, display string, comment and style, and
//!   keeps structurally-present empty rows represented;
//! - records the codec does not interpret (styles, column widths, future
//!   record types) are carried through byte-for-byte and re-emitted at
//!   their anchored positions;
//! - encoding is deterministic, so encode → decode → encode is
//!   byte-identical.
//!
//! Corrupt input fails the whole decode; there is no partial success.

mod decode;
mod dialect;
mod document;
mod encode;
mod error;
pub mod records;
pub mod varint;

pub use decode::{decode, decode_from};
pub use dialect::canonicalize_formula;
pub use document::{FwbDocument, FwbRow, FwbSheet, RawRecord};
pub use encode::{encode, encode_into};
pub use error::FwbError;
