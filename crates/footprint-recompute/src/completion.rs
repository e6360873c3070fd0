//! Completion metric over a parsed parameter tree.

use serde::Serialize;

use footprint_model::{ParamKind, ParamValue, Parameter, ParameterTree, Sector};

/// How far along a document's questionnaire is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Completion {
    /// Rounded percentage of fillable parameters that carry an answer.
    pub rate: u32,
    /// Fillable parameters still waiting for one.
    pub uncompleted: Vec<Parameter>,
}

impl Completion {
    /// Measure a tree, flattened recursively through nested sectors.
    ///
    /// A tree with no sectors reports 100: there is nothing left to ask.
    pub fn of(tree: &ParameterTree) -> Completion {
        if tree.sectors.is_empty() {
            return Completion {
                rate: 100,
                uncompleted: Vec::new(),
            };
        }

        let mut fillable = Vec::new();
        collect(&tree.sectors, &mut fillable);

        let completed = fillable.iter().filter(|p| !p.value.is_empty()).count();
        let rate = (100.0 * completed as f64 / fillable.len().max(1) as f64).round() as u32;
        let uncompleted = fillable
            .into_iter()
            .filter(|p| p.value.is_empty())
            .cloned()
            .collect();

        Completion { rate, uncompleted }
    }
}

/// A parameter counts when a respondent is actually expected to fill it:
/// standard kind, currently displayed, and not pre-filled with the zero
/// default sentinel.
fn is_fillable(param: &Parameter) -> bool {
    param.kind == ParamKind::Standard
        && param.displayed
        && param.default != ParamValue::Number(0.0)
}

fn collect<'a>(sectors: &'a [Sector], out: &mut Vec<&'a Parameter>) {
    for sector in sectors {
        out.extend(sector.parameters.iter().filter(|p| is_fillable(p)));
        collect(&sector.children, out);
    }
}
