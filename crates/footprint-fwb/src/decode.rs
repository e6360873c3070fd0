use std::io::{BufReader, Read};

use footprint_model::{Cell, CellValue, NamedExpression, MAX_COLS, MAX_ROWS};

use crate::dialect::canonicalize_formula;
use crate::document::{FwbDocument, FwbSheet, RawRecord};
use crate::error::FwbError;
use crate::records::{self, id, CELL_FLAGS_KNOWN, CELL_FLAG_COMMENT, CELL_FLAG_DISPLAY};
use crate::varint;

/// Decode a complete FWB stream from a byte slice.
pub fn decode(bytes: &[u8]) -> Result<FwbDocument, FwbError> {
    decode_from(bytes)
}

/// Decode a complete FWB stream from a reader.
///
/// Formula text (cells and named expressions) is canonicalized into the
/// engine dialect on the way in; see [`crate::canonicalize_formula`].
pub fn decode_from<R: Read>(input: R) -> Result<FwbDocument, FwbError> {
    let mut stream = FwbStream::new(input);
    let mut buf = Vec::new();

    let Some(rec) = stream.read_record(&mut buf)? else {
        return Err(FwbError::MissingBookHeader);
    };
    if rec.id != id::BEGIN_BOOK {
        return Err(FwbError::MissingBookHeader);
    }
    let mut rr = RecordReader::new(rec.id, rec.data);
    let version = rr.read_u16()?;
    rr.finish()?;
    if version > records::FORMAT_VERSION {
        return Err(FwbError::UnsupportedVersion(version));
    }

    let mut doc = FwbDocument::default();
    // NAME records may precede the sheets they are scoped to; indices are
    // resolved to sheet names once the whole stream is read.
    let mut raw_names: Vec<(u32, String, String)> = Vec::new();
    let mut sheet: Option<FwbSheet> = None;
    let mut current_row: Option<u32> = None;
    let mut ended = false;

    while let Some(rec) = stream.read_record(&mut buf)? {
        if ended {
            return Err(FwbError::TrailingData);
        }
        match rec.id {
            id::BEGIN_BOOK => return Err(FwbError::UnexpectedRecord(rec.id)),
            id::END_BOOK => {
                if sheet.is_some() {
                    return Err(FwbError::UnexpectedRecord(rec.id));
                }
                RecordReader::new(rec.id, rec.data).finish()?;
                ended = true;
            }
            id::NAME => {
                if sheet.is_some() {
                    return Err(FwbError::UnexpectedRecord(rec.id));
                }
                let mut rr = RecordReader::new(rec.id, rec.data);
                let scope = rr.read_u32()?;
                let name = rr.read_utf16_string()?;
                let expr = rr.read_utf16_string()?;
                rr.finish()?;
                raw_names.push((scope, name, canonicalize_formula(&expr)));
            }
            id::BEGIN_SHEET => {
                if sheet.is_some() {
                    return Err(FwbError::UnexpectedRecord(rec.id));
                }
                let mut rr = RecordReader::new(rec.id, rec.data);
                let name = rr.read_utf16_string()?;
                rr.finish()?;
                if doc.sheet(&name).is_some() {
                    return Err(FwbError::DuplicateSheet(name));
                }
                sheet = Some(FwbSheet::new(name));
                current_row = None;
            }
            id::END_SHEET => {
                let Some(done) = sheet.take() else {
                    return Err(FwbError::UnexpectedRecord(rec.id));
                };
                RecordReader::new(rec.id, rec.data).finish()?;
                doc.sheets.push(done);
                current_row = None;
            }
            id::ROW => {
                let Some(sheet) = sheet.as_mut() else {
                    return Err(FwbError::UnexpectedRecord(rec.id));
                };
                let mut rr = RecordReader::new(rec.id, rec.data);
                let row = rr.read_u32()?;
                rr.finish()?;
                if row >= MAX_ROWS {
                    return Err(FwbError::CellOutOfBounds);
                }
                sheet.ensure_row(row);
                current_row = Some(row);
            }
            cell_id if records::is_cell(cell_id) => {
                let Some(sheet) = sheet.as_mut() else {
                    return Err(FwbError::UnexpectedRecord(cell_id));
                };
                let Some(row) = current_row else {
                    return Err(FwbError::CellOutsideRow);
                };
                let (col, cell) = parse_cell(cell_id, rec.data)?;
                sheet
                    .rows
                    .get_mut(&row)
                    .expect("current row was ensured")
                    .cells
                    .insert(col, cell);
            }
            _ => {
                let raw = RawRecord {
                    id: rec.id,
                    data: rec.data.to_vec(),
                };
                match sheet.as_mut() {
                    Some(sheet) => match current_row {
                        Some(row) => sheet
                            .rows
                            .get_mut(&row)
                            .expect("current row was ensured")
                            .extras
                            .push(raw),
                        None => sheet.leading_extras.push(raw),
                    },
                    None => {
                        let anchor = (!doc.sheets.is_empty())
                            .then(|| doc.sheets.len() as u32 - 1);
                        doc.extras.push((anchor, raw));
                    }
                }
            }
        }
    }

    if sheet.is_some() || !ended {
        return Err(FwbError::UnexpectedEof);
    }

    for (scope, name, expr) in raw_names {
        let scope = if scope == records::NAME_SCOPE_GLOBAL {
            None
        } else {
            let sheet = doc
                .sheets
                .get(scope as usize)
                .ok_or(FwbError::InvalidNameScope(scope))?;
            Some(sheet.name.clone())
        };
        doc.names.push(NamedExpression { name, scope, expr });
    }

    Ok(doc)
}

fn parse_cell(cell_id: u32, data: &[u8]) -> Result<(u32, Cell), FwbError> {
    let mut rr = RecordReader::new(cell_id, data);
    let col = rr.read_u32()?;
    if col >= MAX_COLS {
        return Err(FwbError::CellOutOfBounds);
    }
    let style = rr.read_u32()?;
    let flags = rr.read_u8()?;
    if flags & !CELL_FLAGS_KNOWN != 0 {
        return Err(FwbError::InvalidCellFlags(flags));
    }

    let value = match cell_id {
        id::BLANK | id::FORMULA_BLANK => CellValue::Empty,
        id::NUM | id::FORMULA_NUM => CellValue::Number(rr.read_f64()?),
        id::BOOL | id::FORMULA_BOOL => CellValue::Boolean(rr.read_u8()? != 0),
        id::ERR | id::FORMULA_ERR => CellValue::Error(rr.read_u8()?),
        id::STR | id::FORMULA_STR => CellValue::Text(rr.read_utf16_string()?),
        id::DATE | id::FORMULA_DATE => CellValue::Date(rr.read_f64()?),
        other => return Err(FwbError::UnexpectedRecord(other)),
    };
    let formula = records::is_formula_cell(cell_id)
        .then(|| rr.read_utf16_string())
        .transpose()?
        .map(|text| canonicalize_formula(&text));
    let display = (flags & CELL_FLAG_DISPLAY != 0)
        .then(|| rr.read_utf16_string())
        .transpose()?;
    let comment = (flags & CELL_FLAG_COMMENT != 0)
        .then(|| rr.read_utf16_string())
        .transpose()?;
    rr.finish()?;

    Ok((
        col,
        Cell {
            value,
            formula,
            display,
            comment,
            style,
        },
    ))
}

pub(crate) struct FwbStream<R: Read> {
    inner: BufReader<R>,
}

pub(crate) struct FwbRecord<'a> {
    pub id: u32,
    pub data: &'a [u8],
}

impl<R: Read> FwbStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    pub fn read_record<'a>(
        &mut self,
        buf: &'a mut Vec<u8>,
    ) -> Result<Option<FwbRecord<'a>>, FwbError> {
        let Some(record_id) = varint::read_record_id(&mut self.inner)? else {
            return Ok(None);
        };
        let Some(len) = varint::read_record_len(&mut self.inner)? else {
            return Err(FwbError::UnexpectedEof);
        };

        buf.clear();
        buf.resize(len as usize, 0);
        self.inner.read_exact(buf)?;
        Ok(Some(FwbRecord {
            id: record_id,
            data: buf,
        }))
    }
}

/// Offset-tracked view over one record payload.
struct RecordReader<'a> {
    record_id: u32,
    data: &'a [u8],
    offset: usize,
}

impl<'a> RecordReader<'a> {
    fn new(record_id: u32, data: &'a [u8]) -> Self {
        Self {
            record_id,
            data,
            offset: 0,
        }
    }

    fn read_u8(&mut self) -> Result<u8, FwbError> {
        let b = *self.data.get(self.offset).ok_or(FwbError::UnexpectedEof)?;
        self.offset += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, FwbError> {
        let bytes: [u8; 2] = self
            .data
            .get(self.offset..self.offset + 2)
            .ok_or(FwbError::UnexpectedEof)?
            .try_into()
            .expect("slice length checked");
        self.offset += 2;
        Ok(u16::from_le_bytes(bytes))
    }

    fn read_u32(&mut self) -> Result<u32, FwbError> {
        let bytes: [u8; 4] = self
            .data
            .get(self.offset..self.offset + 4)
            .ok_or(FwbError::UnexpectedEof)?
            .try_into()
            .expect("slice length checked");
        self.offset += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> Result<f64, FwbError> {
        let bytes: [u8; 8] = self
            .data
            .get(self.offset..self.offset + 8)
            .ok_or(FwbError::UnexpectedEof)?
            .try_into()
            .expect("slice length checked");
        self.offset += 8;
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_utf16_string(&mut self) -> Result<String, FwbError> {
        let len_chars = self.read_u32()? as usize;
        let byte_len = len_chars.checked_mul(2).ok_or(FwbError::UnexpectedEof)?;
        let end = self
            .offset
            .checked_add(byte_len)
            .ok_or(FwbError::UnexpectedEof)?;
        let raw = self
            .data
            .get(self.offset..end)
            .ok_or(FwbError::UnexpectedEof)?;
        self.offset = end;

        let mut units = Vec::with_capacity(len_chars);
        for chunk in raw.chunks_exact(2) {
            units.push(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Known records must be consumed exactly; leftover bytes mean a layout
    /// this codec does not understand, which cannot be preserved safely.
    fn finish(&self) -> Result<(), FwbError> {
        if self.offset == self.data.len() {
            Ok(())
        } else {
            Err(FwbError::TrailingRecordBytes(self.record_id))
        }
    }
}
