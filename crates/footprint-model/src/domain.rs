use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

/// Parsed Parameters fragment: the sector tree plus the optional document
/// name surfaced from the `name` parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sectors: Vec<Sector>,
}

/// One section of the questionnaire. Sectors nest; a sector owns the
/// parameters between its heading row and the next heading of equal or
/// shallower level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: String,
    pub label: String,
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Sector>,
}

/// Row kind discriminator for parameter rows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Ordinary fillable parameter.
    #[default]
    Standard,
    /// Explanatory text; never counted as fillable.
    Info,
    /// Import helper row; never counted as fillable.
    Import,
}

/// One answerable row of the questionnaire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub kind: ParamKind,
    /// Whether the row is currently shown to respondents.
    #[serde(default)]
    pub displayed: bool,
    /// Default/expected value; a numeric zero here marks the row as
    /// pre-filled for the completion metric.
    #[serde(default)]
    pub default: ParamValue,
    #[serde(default)]
    pub value: ParamValue,
    /// Absolute sheet row the parameter was parsed from.
    pub row: u32,
}

/// Value slot of a parsed parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    List(Vec<String>),
}

impl ParamValue {
    /// Empty means "the respondent has not answered": no value, a blank
    /// string, or a list whose first element is the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Empty => true,
            ParamValue::Text(s) => s.is_empty(),
            ParamValue::List(items) => items.first().is_none_or(|first| first.is_empty()),
            ParamValue::Number(_) | ParamValue::Boolean(_) => false,
        }
    }
}

impl From<&CellValue> for ParamValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => ParamValue::Empty,
            CellValue::Number(n) | CellValue::Date(n) => ParamValue::Number(*n),
            CellValue::Text(s) => ParamValue::Text(s.clone()),
            CellValue::Boolean(b) => ParamValue::Boolean(*b),
            CellValue::Error(code) => ParamValue::Text(crate::errors::error_display(*code)),
        }
    }
}

/// One parsed row of an Actions or Results range: the declared semantic
/// fields and the cell values found under them. The core never interprets
/// these beyond handing them back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeRecord {
    /// Absolute sheet row.
    pub row: u32,
    pub fields: BTreeMap<String, CellValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_value_emptiness() {
        assert!(ParamValue::Empty.is_empty());
        assert!(ParamValue::Text(String::new()).is_empty());
        assert!(ParamValue::List(vec![String::new(), "x".to_string()]).is_empty());
        assert!(ParamValue::List(Vec::new()).is_empty());

        assert!(!ParamValue::Number(0.0).is_empty());
        assert!(!ParamValue::Boolean(false).is_empty());
        assert!(!ParamValue::List(vec!["gaz".to_string()]).is_empty());
    }

    #[test]
    fn error_cells_surface_their_literal() {
        let v = ParamValue::from(&CellValue::Error(0x07));
        assert_eq!(v, ParamValue::Text("#DIV/0!".to_string()));
    }
}
