use serde::{Deserialize, Serialize};

/// Typed cell value, mirroring the FWB on-disk type tags.
///
/// The enum uses an explicit `{type, value}` tagged layout so coercion rules
/// can be written as exhaustive matches and so the JSON form is stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Empty / unset cell value.
    Empty,
    /// IEEE-754 double precision number.
    Number(f64),
    /// Plain string.
    Text(String),
    /// Boolean.
    Boolean(bool),
    /// Spreadsheet error, stored as the FWB numeric code (see [`crate::errors`]).
    Error(u8),
    /// Serial date number (days since 1899-12-30, fractional time of day).
    Date(f64),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    /// Returns true if the value is [`CellValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// One populated grid cell.
///
/// Invariant: when `formula` is set, `value` and `display` hold the *last
/// computed* result. They are only ever rewritten as a consequence of
/// re-evaluating the formula, never edited directly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    /// Canonical formula text without a leading `=` (see [`crate::formula_text`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Cached display string, when the producing application stored one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Author annotation. Independent of the value; survives value rewrites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Index into the document's style table (opaque to this crate).
    #[serde(default)]
    pub style: u32,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn with_formula(value: CellValue, formula: impl Into<String>) -> Self {
        Self {
            value,
            formula: Some(formula.into()),
            ..Self::default()
        }
    }

    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }
}
