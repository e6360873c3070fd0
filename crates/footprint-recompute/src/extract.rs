//! Business ranges back into caller-facing domain structures.
//!
//! Extraction runs after a batch persisted, over whichever ranges had a
//! cell change on their sheet. Parsers are pure functions of the decoded
//! grid; the service decides when one needs to run.

use std::collections::BTreeMap;

use footprint_engine::Value;
use footprint_fwb::FwbSheet;
use footprint_model::{
    errors::error_display, fields, Cell, CellRef, CellValue, ParamKind, ParamValue, Parameter,
    ParameterTree, RangeRecord, RangeSpec, Sector,
};

use crate::resolver::id_key;

/// Range-to-structure parser run by the service after a batch.
pub trait DomainParser {
    /// Parse the Parameters range into the sector tree.
    fn parse_parameters(&self, sheet: &FwbSheet, range: &RangeSpec) -> ParameterTree;
    /// Parse an Actions or Results range into row records.
    fn parse_records(&self, sheet: &FwbSheet, range: &RangeSpec) -> Vec<RangeRecord>;
}

/// Built-in parser for the standard model layout: one row per parameter,
/// heading rows opening sectors.
///
/// A heading row carries an id and a numeric `level` entry but no value;
/// deeper levels nest under the closest shallower heading. Every other row
/// with an id is a parameter (an empty value cell just means the row is
/// unanswered). Rows before the first heading land in an unlabeled leading
/// sector. The tree name is surfaced from the parameter whose id is
/// `name`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModelParser;

struct OpenSector {
    level: u32,
    sector: Sector,
}

/// Pop sectors at `level` or deeper, attaching each to its parent (or the
/// root list once the stack is empty).
fn close_to(stack: &mut Vec<OpenSector>, roots: &mut Vec<Sector>, level: u32) {
    while stack.last().is_some_and(|open| open.level >= level) {
        if let Some(open) = stack.pop() {
            attach(stack, roots, open.sector);
        }
    }
}

fn attach(stack: &mut [OpenSector], roots: &mut Vec<Sector>, sector: Sector) {
    match stack.last_mut() {
        Some(parent) => parent.sector.children.push(sector),
        None => roots.push(sector),
    }
}

fn cell_at(sheet: &FwbSheet, row: u32, col: u32) -> Option<&Cell> {
    sheet.cell(CellRef::new(row, col))
}

fn text_of(value: &CellValue) -> String {
    match value {
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) | CellValue::Date(n) => n.to_string(),
        CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        CellValue::Error(code) => error_display(*code),
        CellValue::Empty => String::new(),
    }
}

fn kind_of(value: &CellValue) -> ParamKind {
    let CellValue::Text(s) = value else {
        return ParamKind::Standard;
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "info" => ParamKind::Info,
        "import" => ParamKind::Import,
        _ => ParamKind::Standard,
    }
}

/// Display flags reuse the evaluator's boolean coercion; anything it cannot
/// read as a boolean counts as hidden.
fn truthy(value: &CellValue) -> bool {
    Value::from_stored(value).coerce_to_bool().unwrap_or(false)
}

impl DomainParser for ModelParser {
    fn parse_parameters(&self, sheet: &FwbSheet, range: &RangeSpec) -> ParameterTree {
        let (Some(id_col), Some(value_col)) =
            (range.column(fields::ID), range.column(fields::VALUE))
        else {
            return ParameterTree::default();
        };
        let level_col = range.column(fields::LEVEL);
        let label_col = range.column(fields::LABEL);
        let kind_col = range.column(fields::KIND);
        let display_col = range.column(fields::DISPLAY);
        let default_col = range.column(fields::DEFAULT);

        let mut tree = ParameterTree::default();
        let mut stack: Vec<OpenSector> = Vec::new();

        for row in range.data_rows() {
            let Some(id) = cell_at(sheet, row, id_col).and_then(|c| id_key(&c.value)) else {
                continue;
            };
            let value_cell = cell_at(sheet, row, value_col);
            let value_empty = value_cell.is_none_or(|c| c.value.is_empty());

            let heading_level = level_col
                .and_then(|col| cell_at(sheet, row, col))
                .and_then(|c| match c.value {
                    CellValue::Number(n) | CellValue::Date(n) => Some(n.max(1.0) as u32),
                    _ => None,
                });
            if let (Some(level), true) = (heading_level, value_empty) {
                close_to(&mut stack, &mut tree.sectors, level);
                stack.push(OpenSector {
                    level,
                    sector: Sector {
                        id,
                        label: label_col
                            .and_then(|col| cell_at(sheet, row, col))
                            .map(|c| text_of(&c.value))
                            .unwrap_or_default(),
                        parameters: Vec::new(),
                        children: Vec::new(),
                    },
                });
                continue;
            }

            if id == "name" {
                if let Some(CellValue::Text(s)) = value_cell.map(|c| &c.value) {
                    if !s.is_empty() {
                        tree.name = Some(s.clone());
                    }
                }
            }

            let param = Parameter {
                id,
                label: label_col
                    .and_then(|col| cell_at(sheet, row, col))
                    .map(|c| text_of(&c.value))
                    .unwrap_or_default(),
                kind: kind_col
                    .and_then(|col| cell_at(sheet, row, col))
                    .map(|c| kind_of(&c.value))
                    .unwrap_or_default(),
                displayed: match display_col {
                    Some(col) => cell_at(sheet, row, col).is_some_and(|c| truthy(&c.value)),
                    // A model without a display column shows every row.
                    None => true,
                },
                default: default_col
                    .and_then(|col| cell_at(sheet, row, col))
                    .map(|c| ParamValue::from(&c.value))
                    .unwrap_or_default(),
                value: value_cell
                    .map(|c| ParamValue::from(&c.value))
                    .unwrap_or_default(),
                row,
            };

            match stack.last_mut() {
                Some(open) => open.sector.parameters.push(param),
                None => {
                    if tree.sectors.is_empty() {
                        tree.sectors.push(Sector::default());
                    }
                    if let Some(leading) = tree.sectors.first_mut() {
                        leading.parameters.push(param);
                    }
                }
            }
        }

        while let Some(open) = stack.pop() {
            attach(&mut stack, &mut tree.sectors, open.sector);
        }
        tree
    }

    fn parse_records(&self, sheet: &FwbSheet, range: &RangeSpec) -> Vec<RangeRecord> {
        let mut records = Vec::new();
        for row in range.data_rows() {
            let mut found = BTreeMap::new();
            for name in range.fields.keys() {
                let Some(col) = range.column(name) else {
                    continue;
                };
                if let Some(cell) = cell_at(sheet, row, col) {
                    if !cell.value.is_empty() {
                        found.insert(name.clone(), cell.value.clone());
                    }
                }
            }
            if !found.is_empty() {
                records.push(RangeRecord { row, fields: found });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn params_range() -> RangeSpec {
        let mut map = BTreeMap::new();
        map.insert(fields::ID.to_string(), 0);
        map.insert(fields::LABEL.to_string(), 1);
        map.insert(fields::KIND.to_string(), 2);
        map.insert(fields::LEVEL.to_string(), 3);
        map.insert(fields::DISPLAY.to_string(), 4);
        map.insert(fields::DEFAULT.to_string(), 5);
        map.insert(fields::VALUE.to_string(), 6);
        let mut spec = RangeSpec::from_sheet_a1("Params!A1:G20", map).unwrap();
        spec.header_rows = 1;
        spec
    }

    fn set(sheet: &mut FwbSheet, row: u32, col: u32, value: CellValue) {
        sheet.set_cell(CellRef::new(row, col), Cell::new(value));
    }

    fn heading(sheet: &mut FwbSheet, row: u32, id: &str, label: &str, level: f64) {
        set(sheet, row, 0, id.into());
        set(sheet, row, 1, label.into());
        set(sheet, row, 3, CellValue::Number(level));
    }

    fn parameter(sheet: &mut FwbSheet, row: u32, id: &str, value: CellValue) {
        set(sheet, row, 0, id.into());
        set(sheet, row, 1, format!("label {id}").into());
        set(sheet, row, 4, CellValue::Boolean(true));
        if !value.is_empty() {
            set(sheet, row, 6, value);
        }
    }

    #[test]
    fn sectors_nest_by_level() {
        let mut sheet = FwbSheet::new("Params");
        heading(&mut sheet, 1, "general", "General", 1.0);
        parameter(&mut sheet, 2, "surface", CellValue::Number(100.0));
        heading(&mut sheet, 3, "energy", "Energy", 2.0);
        parameter(&mut sheet, 4, "gas", CellValue::Empty);
        heading(&mut sheet, 5, "transport", "Transport", 1.0);
        parameter(&mut sheet, 6, "km", CellValue::Number(1200.0));

        let tree = ModelParser.parse_parameters(&sheet, &params_range());
        assert_eq!(tree.sectors.len(), 2);

        let general = &tree.sectors[0];
        assert_eq!(general.id, "general");
        assert_eq!(general.label, "General");
        assert_eq!(general.parameters.len(), 1);
        assert_eq!(general.parameters[0].id, "surface");
        assert_eq!(general.children.len(), 1);
        assert_eq!(general.children[0].id, "energy");
        assert_eq!(general.children[0].parameters[0].id, "gas");
        assert_eq!(general.children[0].parameters[0].value, ParamValue::Empty);

        let transport = &tree.sectors[1];
        assert_eq!(transport.id, "transport");
        assert_eq!(transport.parameters[0].id, "km");
    }

    #[test]
    fn unanswered_rows_are_parameters_not_headings() {
        let mut sheet = FwbSheet::new("Params");
        heading(&mut sheet, 1, "general", "General", 1.0);
        // id present, value empty, no level entry
        parameter(&mut sheet, 2, "heating", CellValue::Empty);

        let tree = ModelParser.parse_parameters(&sheet, &params_range());
        assert_eq!(tree.sectors.len(), 1);
        assert_eq!(tree.sectors[0].parameters.len(), 1);
        assert_eq!(tree.sectors[0].parameters[0].id, "heating");
    }

    #[test]
    fn rows_before_the_first_heading_get_a_leading_sector() {
        let mut sheet = FwbSheet::new("Params");
        parameter(&mut sheet, 1, "name", CellValue::Text("Alpha".into()));
        heading(&mut sheet, 2, "general", "General", 1.0);
        parameter(&mut sheet, 3, "surface", CellValue::Number(100.0));

        let tree = ModelParser.parse_parameters(&sheet, &params_range());
        assert_eq!(tree.name.as_deref(), Some("Alpha"));
        assert_eq!(tree.sectors.len(), 2);
        assert_eq!(tree.sectors[0].id, "");
        assert_eq!(tree.sectors[0].parameters[0].id, "name");
        assert_eq!(tree.sectors[1].id, "general");
    }

    #[test]
    fn parameter_fields_are_read_from_their_columns() {
        let mut sheet = FwbSheet::new("Params");
        heading(&mut sheet, 1, "general", "General", 1.0);
        set(&mut sheet, 2, 0, "note".into());
        set(&mut sheet, 2, 1, "Read me".into());
        set(&mut sheet, 2, 2, "info".into());
        set(&mut sheet, 2, 4, CellValue::Boolean(true));
        set(&mut sheet, 3, 0, "prefilled".into());
        set(&mut sheet, 3, 4, CellValue::Number(1.0));
        set(&mut sheet, 3, 5, CellValue::Number(0.0));
        set(&mut sheet, 4, 0, "hidden".into());
        set(&mut sheet, 4, 4, CellValue::Boolean(false));

        let tree = ModelParser.parse_parameters(&sheet, &params_range());
        let params = &tree.sectors[0].parameters;
        assert_eq!(params.len(), 3);

        assert_eq!(params[0].kind, ParamKind::Info);
        assert_eq!(params[0].label, "Read me");
        assert!(params[0].displayed);

        assert_eq!(params[1].kind, ParamKind::Standard);
        assert_eq!(params[1].default, ParamValue::Number(0.0));
        assert!(params[1].displayed);

        assert!(!params[2].displayed);
        assert_eq!(params[2].label, "");
    }

    #[test]
    fn records_skip_blank_rows_and_undeclared_columns() {
        let mut map = BTreeMap::new();
        map.insert("title".to_string(), 0);
        map.insert("total".to_string(), 1);
        let range = RangeSpec::from_sheet_a1("Results!A1:B5", map).unwrap();

        let mut sheet = FwbSheet::new("Results");
        set(&mut sheet, 0, 0, "Carbon total".into());
        set(&mut sheet, 0, 1, CellValue::Number(1250.0));
        // column C is outside the declared fields and must not leak in
        set(&mut sheet, 0, 2, "noise".into());
        set(&mut sheet, 2, 1, CellValue::Number(3.0));

        let records = ModelParser.parse_records(&sheet, &range);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].row, 0);
        assert_eq!(records[0].fields.len(), 2);
        assert_eq!(
            records[0].fields.get("title"),
            Some(&CellValue::Text("Carbon total".to_string()))
        );

        assert_eq!(records[1].row, 2);
        assert_eq!(records[1].fields.len(), 1);
        assert_eq!(
            records[1].fields.get("total"),
            Some(&CellValue::Number(3.0))
        );
    }
}
