use std::io::{self, Write};

use footprint_model::{Cell, CellValue};

use crate::document::{FwbDocument, RawRecord};
use crate::error::FwbError;
use crate::records::{self, id, CELL_FLAG_COMMENT, CELL_FLAG_DISPLAY};
use crate::varint;

/// Encode a document into a fresh byte buffer.
pub fn encode(doc: &FwbDocument) -> Result<Vec<u8>, FwbError> {
    let mut out = Vec::new();
    encode_into(doc, &mut out)?;
    Ok(out)
}

/// Encode a document into `w`.
///
/// Emission is canonical and deterministic: rows and cells in ascending
/// order, passthrough records at their anchors, so encoding the same
/// document twice yields byte-identical output.
pub fn encode_into<W: Write>(doc: &FwbDocument, w: W) -> Result<(), FwbError> {
    let mut writer = FwbWriter::new(w);
    let mut payload = Payload::default();

    payload.reset().u16(records::FORMAT_VERSION);
    writer.record(id::BEGIN_BOOK, payload.bytes())?;

    for name in &doc.names {
        let scope = match &name.scope {
            None => records::NAME_SCOPE_GLOBAL,
            Some(sheet_name) => doc
                .sheets
                .iter()
                .position(|s| &s.name == sheet_name)
                .ok_or_else(|| FwbError::UnknownScopeSheet(sheet_name.clone()))?
                as u32,
        };
        payload.reset().u32(scope).utf16(&name.name).utf16(&name.expr);
        writer.record(id::NAME, payload.bytes())?;
    }

    for (anchor, raw) in &doc.extras {
        if anchor.is_none() {
            writer.raw(raw)?;
        }
    }

    for (index, sheet) in doc.sheets.iter().enumerate() {
        payload.reset().utf16(&sheet.name);
        writer.record(id::BEGIN_SHEET, payload.bytes())?;

        for raw in &sheet.leading_extras {
            writer.raw(raw)?;
        }

        for (&row, row_data) in &sheet.rows {
            payload.reset().u32(row);
            writer.record(id::ROW, payload.bytes())?;

            for (&col, cell) in &row_data.cells {
                encode_cell(&mut writer, &mut payload, col, cell)?;
            }
            for raw in &row_data.extras {
                writer.raw(raw)?;
            }
        }

        writer.record(id::END_SHEET, &[])?;

        for (anchor, raw) in &doc.extras {
            if *anchor == Some(index as u32) {
                writer.raw(raw)?;
            }
        }
    }

    writer.record(id::END_BOOK, &[])?;
    Ok(())
}

fn encode_cell<W: Write>(
    writer: &mut FwbWriter<W>,
    payload: &mut Payload,
    col: u32,
    cell: &Cell,
) -> Result<(), FwbError> {
    let record_id = match (&cell.value, cell.formula.is_some()) {
        (CellValue::Empty, false) => id::BLANK,
        (CellValue::Number(_), false) => id::NUM,
        (CellValue::Boolean(_), false) => id::BOOL,
        (CellValue::Error(_), false) => id::ERR,
        (CellValue::Text(_), false) => id::STR,
        (CellValue::Date(_), false) => id::DATE,
        (CellValue::Empty, true) => id::FORMULA_BLANK,
        (CellValue::Number(_), true) => id::FORMULA_NUM,
        (CellValue::Boolean(_), true) => id::FORMULA_BOOL,
        (CellValue::Error(_), true) => id::FORMULA_ERR,
        (CellValue::Text(_), true) => id::FORMULA_STR,
        (CellValue::Date(_), true) => id::FORMULA_DATE,
    };

    let mut flags = 0u8;
    if cell.display.is_some() {
        flags |= CELL_FLAG_DISPLAY;
    }
    if cell.comment.is_some() {
        flags |= CELL_FLAG_COMMENT;
    }

    payload.reset().u32(col).u32(cell.style).u8(flags);
    match &cell.value {
        CellValue::Empty => {}
        CellValue::Number(n) | CellValue::Date(n) => {
            payload.f64(*n);
        }
        CellValue::Boolean(b) => {
            payload.u8(*b as u8);
        }
        CellValue::Error(code) => {
            payload.u8(*code);
        }
        CellValue::Text(s) => {
            payload.utf16(s);
        }
    }
    if let Some(formula) = &cell.formula {
        payload.utf16(formula);
    }
    if let Some(display) = &cell.display {
        payload.utf16(display);
    }
    if let Some(comment) = &cell.comment {
        payload.utf16(comment);
    }

    writer.record(record_id, payload.bytes())?;
    Ok(())
}

/// Low-level writer for FWB record streams.
struct FwbWriter<W: Write> {
    inner: W,
}

impl<W: Write> FwbWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }

    fn record(&mut self, record_id: u32, payload: &[u8]) -> io::Result<()> {
        varint::write_record_id(&mut self.inner, record_id)?;
        varint::write_record_len(&mut self.inner, payload.len() as u32)?;
        self.inner.write_all(payload)
    }

    fn raw(&mut self, raw: &RawRecord) -> io::Result<()> {
        self.record(raw.id, &raw.data)
    }
}

/// Reusable record payload builder.
#[derive(Default)]
struct Payload {
    buf: Vec<u8>,
}

impl Payload {
    fn reset(&mut self) -> &mut Self {
        self.buf.clear();
        self
    }

    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn f64(&mut self, v: f64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn utf16(&mut self, s: &str) -> &mut Self {
        let len = s.encode_utf16().count();
        self.u32(len as u32);
        for unit in s.encode_utf16() {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
        self
    }
}
