use gridcalc_engine::engine::{CellCoordinate, GraphInfo, GraphStats, Grid};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Result of one evaluation pass.
///
/// On success `data` is the evaluated grid and `stats` is set. On a cycle
/// abort `data` is the input grid unchanged, `error` names the cycle and
/// `cycle` holds its path.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
    pub data: Grid,
    /// `"{rowIndex}-{columnKey}"` -> message or error token
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<EvaluationStats>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_path"
    )]
    pub cycle: Option<Vec<CellCoordinate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_info: Option<GraphInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
    pub evaluated_count: usize,
    pub error_count: usize,
    pub cached_count: usize,
    pub graph: GraphStats,
    pub evaluation_order: Vec<String>,
}

impl Evaluation {
    pub fn succeeded(
        data: Grid,
        errors: BTreeMap<String, String>,
        stats: EvaluationStats,
    ) -> Evaluation {
        Evaluation {
            success: true,
            error: None,
            message: format!("Evaluated {} formulas successfully", stats.evaluated_count),
            data,
            errors,
            stats: Some(stats),
            cycle: None,
            dependency_info: None,
        }
    }

    pub fn cycle_abort(
        data: Grid,
        errors: BTreeMap<String, String>,
        path: Vec<CellCoordinate>,
        rendered: &str,
    ) -> Evaluation {
        Evaluation {
            success: false,
            error: Some(format!("Circular dependency detected: {}", rendered)),
            message: "Circular dependencies must be resolved before evaluation".to_string(),
            data,
            errors,
            stats: None,
            cycle: Some(path),
            dependency_info: None,
        }
    }

    /// Attach graph introspection; ignored for failed passes.
    pub fn with_dependency_info(mut self, info: GraphInfo) -> Evaluation {
        if self.success {
            self.dependency_info = Some(info);
        }
        self
    }
}

/// Key of a cell in the `errors` map.
pub(crate) fn cell_key(row_index: usize, column_key: &str) -> String {
    format!("{}-{}", row_index, column_key)
}

fn serialize_path<S: Serializer>(
    path: &Option<Vec<CellCoordinate>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let rendered: Option<Vec<String>> = path
        .as_ref()
        .map(|p| p.iter().map(|c| c.to_string()).collect());
    rendered.serialize(serializer)
}
