use serde::{Deserialize, Serialize};

/// A named expression: symbol bound to an address or formula string,
/// workbook-global unless scoped to one sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedExpression {
    pub name: String,
    /// Sheet the name is scoped to; `None` means workbook-global.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Address or formula text, canonical form (no leading `=`).
    pub expr: String,
}

impl NamedExpression {
    pub fn global(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: None,
            expr: expr.into(),
        }
    }

    pub fn scoped(
        name: impl Into<String>,
        sheet: impl Into<String>,
        expr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            scope: Some(sheet.into()),
            expr: expr.into(),
        }
    }
}
