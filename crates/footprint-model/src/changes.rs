use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::date_write_text;

/// One requested parameter edit.
///
/// `ByIndex` addresses a data row of the Parameters range directly (0-based,
/// relative to the first data row), bypassing id lookup. `ById` goes through
/// the id column scan. Constructed per request, consumed once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterChange {
    #[serde(rename = "index")]
    ByIndex { row: u32, value: ChangeValue },
    #[serde(rename = "id")]
    ById { id: String, value: ChangeValue },
}

impl ParameterChange {
    pub fn value(&self) -> &ChangeValue {
        match self {
            ParameterChange::ByIndex { value, .. } => value,
            ParameterChange::ById { value, .. } => value,
        }
    }
}

/// Payload of a [`ParameterChange`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChangeValue {
    Number(f64),
    Text(String),
    /// Written as locale-fixed `dd/mm/yyyy` text behind the literal-text
    /// marker so the grid never reinterprets it as a serial number.
    Date(NaiveDate),
    /// Ordered list, comma-joined before being written.
    List(Vec<String>),
}

/// A [`ChangeValue`] rendered into the single scalar the grid actually
/// receives.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteValue {
    Number(f64),
    Text(String),
}

impl ChangeValue {
    /// Render into the written form: dates become marked `dd/mm/yyyy` text,
    /// lists are comma-joined.
    pub fn to_write_value(&self) -> WriteValue {
        match self {
            ChangeValue::Number(n) => WriteValue::Number(*n),
            ChangeValue::Text(s) => WriteValue::Text(s.clone()),
            ChangeValue::Date(d) => WriteValue::Text(date_write_text(*d)),
            ChangeValue::List(items) => WriteValue::Text(items.join(",")),
        }
    }
}
