//! Caller-facing output of one recompute call.

use serde::Serialize;

use footprint_model::{Parameter, RangeRecord, Sector};

/// The fragments one batch actually recomputed.
///
/// Absent fields mean "nothing on that range's sheet changed, keep what you
/// had": callers merge the patch into their own persisted record. The JSON
/// form uses the caller contract's camelCase names and omits absent
/// fragments entirely.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sectors: Option<Vec<Sector>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncompleted: Option<Vec<Parameter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<RangeRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RangeRecord>>,
}

impl RecomputePatch {
    /// True when no fragment was recomputed.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_none()
            && self.completion_rate.is_none()
            && self.uncompleted.is_none()
            && self.name.is_none()
            && self.actions.is_none()
            && self.results.is_none()
    }

    /// JSON merge-patch form: recomputed fragments only.
    pub fn to_merge_patch(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
