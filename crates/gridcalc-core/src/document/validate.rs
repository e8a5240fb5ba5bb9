use gridcalc_engine::engine::{extract_dependencies, validate_syntax};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

impl FormulaValidation {
    fn invalid(error: impl Into<String>) -> Self {
        FormulaValidation {
            is_valid: false,
            error: Some(error.into()),
            dependencies: None,
        }
    }
}

/// Check a single formula without evaluating it.
pub fn validate_formula(formula: &str) -> FormulaValidation {
    if formula.trim().is_empty() {
        return FormulaValidation::invalid("Empty formula");
    }
    if !formula.starts_with('=') {
        return FormulaValidation::invalid("Formula must start with =");
    }
    if let Err(e) = validate_syntax(formula) {
        return FormulaValidation::invalid(e.to_string());
    }

    let mut dependencies: Vec<_> = extract_dependencies(formula).into_iter().collect();
    dependencies.sort();
    FormulaValidation {
        is_valid: true,
        error: None,
        dependencies: Some(dependencies.iter().map(|c| c.to_string()).collect()),
    }
}
