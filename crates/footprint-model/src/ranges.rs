use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{parse_sheet_range, Range, RangeParseError};

/// Well-known semantic field names used in business-range field maps.
///
/// The Parameters range must declare at least [`fields::ID`] and
/// [`fields::VALUE`]; everything else is optional and consumed by the domain
/// parser. Actions/Results ranges declare whatever their parser needs.
pub mod fields {
    /// Stable parameter identifier (lookup key).
    pub const ID: &str = "id";
    /// Write target for parameter edits.
    pub const VALUE: &str = "value";
    /// Whether the row is currently shown to respondents.
    pub const DISPLAY: &str = "display";
    /// Whether freshly created documents show the row.
    pub const DISPLAY_ON_CREATE: &str = "display_on_create";
    /// Human label of the row.
    pub const LABEL: &str = "label";
    /// Row kind discriminator (standard / informational / import helper).
    pub const KIND: &str = "kind";
    /// Sector nesting level for heading rows.
    pub const LEVEL: &str = "level";
    /// Default/expected value used by the completion metric.
    pub const DEFAULT: &str = "default";
}

/// Where one business concept (parameters, actions, results) lives inside a
/// sheet: an address window plus a map from semantic field name to column
/// offset within that window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    /// Sheet the window addresses into.
    pub sheet: String,
    /// Inclusive window, serialized in `A1:Z99` notation.
    #[serde(with = "a1_window")]
    pub window: Range,
    /// Header rows at the top of the window that carry no data.
    #[serde(default)]
    pub header_rows: u32,
    /// Semantic field name to 0-based column offset from the window's left edge.
    pub fields: BTreeMap<String, u32>,
}

impl RangeSpec {
    /// Parse the `sheetAndAddress` config shape (`Params!A2:F40`).
    pub fn from_sheet_a1(
        sheet_and_window: &str,
        fields: BTreeMap<String, u32>,
    ) -> Result<Self, RangeParseError> {
        let (sheet, window) = parse_sheet_range(sheet_and_window)?;
        Ok(Self {
            sheet,
            window,
            header_rows: 0,
            fields,
        })
    }

    /// Absolute column index for a semantic field, if the range declares it.
    pub fn column(&self, field: &str) -> Option<u32> {
        let offset = *self.fields.get(field)?;
        let col = self.window.start.col + offset;
        (col <= self.window.end.col).then_some(col)
    }

    /// First absolute row that carries data (window top plus header rows).
    pub fn first_data_row(&self) -> u32 {
        self.window.start.row + self.header_rows
    }

    /// Absolute data rows of the window, top to bottom.
    pub fn data_rows(&self) -> impl Iterator<Item = u32> {
        self.first_data_row()..=self.window.end.row
    }
}

/// Per-document-model range configuration handed in by the caller.
///
/// `parameters` is mandatory; a model without actions or results simply
/// leaves those ranges out and the corresponding fragments are never
/// produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub parameters: RangeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<RangeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<RangeSpec>,
}

/// Serde adapter storing a [`Range`] as its A1 string form.
mod a1_window {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::address::Range;

    pub fn serialize<S: Serializer>(range: &Range, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(range)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Range, D::Error> {
        let text = String::deserialize(de)?;
        Range::from_a1(&text).map_err(D::Error::custom)
    }
}
