use std::fmt;

use footprint_model::{
    errors::{error_code_for_literal, error_literal},
    CellValue,
};

/// Spreadsheet error classes the evaluator can produce or propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    GettingData,
    Calc,
}

impl ErrorKind {
    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NA => "#N/A",
            ErrorKind::GettingData => "#GETTING_DATA",
            ErrorKind::Calc => "#CALC!",
        }
    }

    /// Parse an error literal as it appears in formula text.
    pub fn from_literal(literal: &str) -> Option<Self> {
        let upper = literal.trim().to_ascii_uppercase();
        Some(match upper.as_str() {
            "#NULL!" => ErrorKind::Null,
            "#DIV/0!" => ErrorKind::Div0,
            "#VALUE!" => ErrorKind::Value,
            "#REF!" => ErrorKind::Ref,
            "#NAME?" => ErrorKind::Name,
            "#NUM!" => ErrorKind::Num,
            "#N/A" | "#N/A!" => ErrorKind::NA,
            "#GETTING_DATA" => ErrorKind::GettingData,
            "#CALC!" => ErrorKind::Calc,
            _ => return None,
        })
    }

    /// The stored numeric error code for this kind. `#CALC!` has no code of
    /// its own and falls back to the `#VALUE!` code.
    pub fn to_stored_code(self) -> u8 {
        error_code_for_literal(self.as_code())
    }

    pub fn from_stored_code(code: u8) -> Self {
        error_literal(code)
            .and_then(ErrorKind::from_literal)
            .unwrap_or(ErrorKind::Value)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A scalar value during evaluation. Dates are represented as serial numbers;
/// the stored [`CellValue::Date`] tag is a persistence concern, not an
/// evaluation one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Blank,
    Error(ErrorKind),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn coerce_to_number(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Blank => Ok(0.0),
            Value::Text(s) => parse_number_text(s).ok_or(ErrorKind::Value),
            Value::Error(e) => Err(*e),
        }
    }

    pub fn coerce_to_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Blank => Ok(false),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("TRUE") {
                    return Ok(true);
                }
                if trimmed.eq_ignore_ascii_case("FALSE") {
                    return Ok(false);
                }
                match parse_number_text(trimmed) {
                    Some(n) => Ok(n != 0.0),
                    None => Err(ErrorKind::Value),
                }
            }
            Value::Error(e) => Err(*e),
        }
    }

    pub fn coerce_to_text(&self) -> Result<String, ErrorKind> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Blank => Ok(String::new()),
            Value::Error(e) => Err(*e),
        }
    }

    /// The evaluation view of a stored cell value.
    pub fn from_stored(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Blank,
            CellValue::Number(n) => Value::Number(*n),
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::Boolean(b) => Value::Bool(*b),
            CellValue::Error(code) => Value::Error(ErrorKind::from_stored_code(*code)),
            CellValue::Date(serial) => Value::Number(*serial),
        }
    }

    pub fn to_stored(&self) -> CellValue {
        match self {
            Value::Blank => CellValue::Empty,
            Value::Number(n) => CellValue::Number(*n),
            Value::Text(s) => CellValue::Text(s.clone()),
            Value::Bool(b) => CellValue::Boolean(*b),
            Value::Error(e) => CellValue::Error(e.to_stored_code()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Blank => Ok(()),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}

/// Plain decimal rendering; `{}` on f64 already avoids scientific notation
/// for the magnitudes model workbooks use.
fn format_number(n: f64) -> String {
    n.to_string()
}

/// Numeric coercion for text. Accepts an optional leading sign, decimal
/// point and exponent; comma decimal separators are accepted since stored
/// model text frequently uses them.
pub(crate) fn parse_number_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized: String;
    let candidate = if trimmed.contains(',') && !trimmed.contains('.') {
        normalized = trimmed.replace(',', ".");
        &normalized
    } else {
        trimmed
    };
    let n: f64 = candidate.parse().ok()?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stored_error_codes_roundtrip_through_kinds() {
        assert_eq!(ErrorKind::from_stored_code(0x07), ErrorKind::Div0);
        assert_eq!(ErrorKind::Div0.to_stored_code(), 0x07);
        assert_eq!(ErrorKind::GettingData.to_stored_code(), 0x2B);

        // #CALC! is engine-only; it persists as the generic value error.
        assert_eq!(ErrorKind::Calc.to_stored_code(), 0x0F);

        // Codes outside the table degrade to the generic value error.
        assert_eq!(ErrorKind::from_stored_code(0x55), ErrorKind::Value);
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from("12.5").coerce_to_number(), Ok(12.5));
        assert_eq!(Value::from("12,5").coerce_to_number(), Ok(12.5));
        assert_eq!(Value::from(" -3 ").coerce_to_number(), Ok(-3.0));
        assert_eq!(Value::Bool(true).coerce_to_number(), Ok(1.0));
        assert_eq!(Value::Blank.coerce_to_number(), Ok(0.0));
        assert_eq!(
            Value::from("grand").coerce_to_number(),
            Err(ErrorKind::Value)
        );
        assert_eq!(
            Value::Error(ErrorKind::NA).coerce_to_number(),
            Err(ErrorKind::NA)
        );
    }

    #[test]
    fn bool_coercion_accepts_literals_and_numbers() {
        assert_eq!(Value::from("true").coerce_to_bool(), Ok(true));
        assert_eq!(Value::from("FALSE").coerce_to_bool(), Ok(false));
        assert_eq!(Value::Number(2.0).coerce_to_bool(), Ok(true));
        assert_eq!(Value::Blank.coerce_to_bool(), Ok(false));
        assert_eq!(Value::from("oui").coerce_to_bool(), Err(ErrorKind::Value));
    }

    #[test]
    fn stored_values_flatten_dates_to_serials() {
        let v = Value::from_stored(&CellValue::Date(45092.0));
        assert_eq!(v, Value::Number(45092.0));
        assert_eq!(v.to_stored(), CellValue::Number(45092.0));
    }
}
