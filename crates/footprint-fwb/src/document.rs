use std::collections::BTreeMap;

use footprint_model::{Cell, CellRef, NamedExpression};

/// A record the codec does not interpret, preserved byte-for-byte for
/// re-emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub id: u32,
    pub data: Vec<u8>,
}

/// Decoded FWB workbook: ordered sheets, workbook-global named expressions,
/// and every uninterpreted record anchored to where it appeared.
///
/// Owned by one recompute call for its decode → apply → encode cycle; never
/// retained across calls except as persisted bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FwbDocument {
    pub names: Vec<NamedExpression>,
    pub sheets: Vec<FwbSheet>,
    /// Book-level records this codec passes through, anchored to the sheet
    /// index they followed (`None` = before the first sheet).
    pub extras: Vec<(Option<u32>, RawRecord)>,
}

impl FwbDocument {
    pub fn sheet(&self, name: &str) -> Option<&FwbSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut FwbSheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Append an empty sheet and return it. Caller guarantees the name is
    /// not already taken; the encoder does not re-validate.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> &mut FwbSheet {
        self.sheets.push(FwbSheet::new(name));
        self.sheets.last_mut().expect("sheet just pushed")
    }
}

/// One sheet: a sparse grid stored row-major, plus uninterpreted records
/// anchored to the row they followed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FwbSheet {
    pub name: String,
    /// Structurally present rows, sorted. A row may be empty; emptiness is
    /// still round-tripped so range row arithmetic stays stable.
    pub rows: BTreeMap<u32, FwbRow>,
    /// Records seen after `BEGIN_SHEET` but before the first `ROW`.
    pub leading_extras: Vec<RawRecord>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FwbRow {
    /// Populated cells by column, sorted.
    pub cells: BTreeMap<u32, Cell>,
    /// Uninterpreted records that followed this row's cells.
    pub extras: Vec<RawRecord>,
}

impl FwbSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Mark `row` structurally present without populating any cell.
    pub fn ensure_row(&mut self, row: u32) -> &mut FwbRow {
        self.rows.entry(row).or_default()
    }

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.rows.get(&at.row)?.cells.get(&at.col)
    }

    pub fn set_cell(&mut self, at: CellRef, cell: Cell) {
        self.ensure_row(at.row).cells.insert(at.col, cell);
    }

    /// Existing cell entry at `at`, or a freshly inserted empty one. Used by
    /// write-back, which must keep entries present even when clearing them.
    pub fn cell_mut_or_insert(&mut self, at: CellRef) -> &mut Cell {
        self.ensure_row(at.row).cells.entry(at.col).or_default()
    }

    /// All populated cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.rows.iter().flat_map(|(&row, r)| {
            r.cells
                .iter()
                .map(move |(&col, cell)| (CellRef::new(row, col), cell))
        })
    }

    /// Number of populated cells across all rows.
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.cells.len()).sum()
    }
}
