//! FWB record ids and payload layouts.
//!
//! An FWB stream is a flat sequence of `[id varint][len varint][payload]`
//! records (see [`crate::varint`]). Structure:
//!
//! ```text
//! BEGIN_BOOK {version: u16}
//!   NAME*            {scope: u32 (0xFFFF_FFFF = global, else sheet index),
//!                     name: str, expr: str}
//!   <unknown book records, preserved opaquely>
//!   BEGIN_SHEET {name: str}
//!     ROW {row: u32}
//!       <cell records for that row>
//!       <unknown sheet records, preserved opaquely>
//!   END_SHEET
//! END_BOOK
//! ```
//!
//! Cell record payloads share a common prefix `[col: u32][style: u32]
//! [flags: u8]` followed by the value, then the formula text for `FORMULA_*`
//! records, then a display string when `flags & 0x01` and a comment when
//! `flags & 0x02`. `str` is a u32 char count followed by UTF-16LE code units.

/// Version written by this codec; decoding rejects anything newer.
pub const FORMAT_VERSION: u16 = 1;

/// Global scope marker in `NAME` records.
pub const NAME_SCOPE_GLOBAL: u32 = 0xFFFF_FFFF;

/// Display string present.
pub const CELL_FLAG_DISPLAY: u8 = 0x01;
/// Comment present.
pub const CELL_FLAG_COMMENT: u8 = 0x02;

pub const CELL_FLAGS_KNOWN: u8 = CELL_FLAG_DISPLAY | CELL_FLAG_COMMENT;

// Record ids. Two-byte ids keep the low byte >= 0x80 so the continuation
// scheme can represent them (see `varint::write_record_id`).
pub mod id {
    pub const ROW: u32 = 0x0000;
    pub const BLANK: u32 = 0x0001;
    pub const NUM: u32 = 0x0002;
    pub const BOOL: u32 = 0x0003;
    pub const ERR: u32 = 0x0004;
    pub const STR: u32 = 0x0005;
    pub const DATE: u32 = 0x0006;
    pub const FORMULA_BLANK: u32 = 0x0008;
    pub const FORMULA_NUM: u32 = 0x0009;
    pub const FORMULA_STR: u32 = 0x000A;
    pub const FORMULA_BOOL: u32 = 0x000B;
    pub const FORMULA_ERR: u32 = 0x000C;
    pub const FORMULA_DATE: u32 = 0x000D;

    pub const BEGIN_BOOK: u32 = 0x0080;
    pub const END_BOOK: u32 = 0x0081;
    pub const NAME: u32 = 0x0082;
    pub const BEGIN_SHEET: u32 = 0x0090;
    pub const END_SHEET: u32 = 0x0091;
}

/// Returns true for the cell-content records.
pub fn is_cell(record_id: u32) -> bool {
    matches!(
        record_id,
        id::BLANK
            | id::NUM
            | id::BOOL
            | id::ERR
            | id::STR
            | id::DATE
            | id::FORMULA_BLANK
            | id::FORMULA_NUM
            | id::FORMULA_STR
            | id::FORMULA_BOOL
            | id::FORMULA_ERR
            | id::FORMULA_DATE
    )
}

/// Returns true for the cell records that carry formula text.
pub fn is_formula_cell(record_id: u32) -> bool {
    matches!(
        record_id,
        id::FORMULA_BLANK
            | id::FORMULA_NUM
            | id::FORMULA_STR
            | id::FORMULA_BOOL
            | id::FORMULA_ERR
            | id::FORMULA_DATE
    )
}
