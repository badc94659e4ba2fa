//! Domain models for the Datalens analysis pipeline.
//!
//! This module contains the data structures passed between pipeline stages:
//!
//! - [`AnalysisInput`] - Validated headers + sample rows
//! - [`ColumnInfo`] - Per-column metadata with the inferred [`ColumnType`]
//! - [`DataQualityMetrics`] - Completeness / consistency scores
//! - [`ChartRecommendation`] - One suggested visualization
//! - [`BusinessInsights`] - Heuristic BI findings
//! - [`AnalysisOutput`] - The final two-field output contract
//!
//! All of them are created within one analysis call and never mutated
//! after being handed to the next stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Number of raw sample values kept per column.
pub const SAMPLE_VALUES_PER_COLUMN: usize = 5;

// =============================================================================
// Input
// =============================================================================

/// Structurally validated input: unique non-blank headers and rows of
/// matching length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub headers: Vec<String>,
    #[serde(rename = "sampleData")]
    pub sample_data: Vec<Vec<Value>>,
}

impl AnalysisInput {
    pub fn row_count(&self) -> usize {
        self.sample_data.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, index: usize) -> Vec<&Value> {
        self.sample_data
            .iter()
            .filter_map(|row| row.get(index))
            .collect()
    }
}

/// True for null, and for strings that are empty after trimming.
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// =============================================================================
// Column metadata
// =============================================================================

/// Semantic type inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numerical,
    Categorical,
    Datetime,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Metadata for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub inferred_type: ColumnType,
    /// Distinct non-missing values.
    pub unique_value_count: usize,
    pub has_missing: bool,
    /// First [`SAMPLE_VALUES_PER_COLUMN`] raw values.
    pub sample_values: Vec<Value>,
}

impl ColumnInfo {
    pub fn is(&self, column_type: ColumnType) -> bool {
        self.inferred_type == column_type
    }
}

/// Heuristic data-quality scores computed from the raw rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityMetrics {
    /// Share of non-missing cells, in `[0, 1]`.
    pub completeness: f64,
    /// Type uniformity score, in `[0, 1]`.
    pub consistency: f64,
    pub issues: Vec<String>,
}

impl DataQualityMetrics {
    /// Mean of completeness and consistency.
    pub fn overall(&self) -> f64 {
        (self.completeness + self.consistency) / 2.0
    }
}

// =============================================================================
// Charts
// =============================================================================

/// Supported chart types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Scatter => "scatter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bar" => Some(Self::Bar),
            "line" => Some(Self::Line),
            "scatter" => Some(Self::Scatter),
            _ => None,
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A suggested visualization. Not a rendered chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChartRecommendation {
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_axis: String,
    pub y_axis: String,
}

/// Identity of a chart inside one output: (type, xAxis, yAxis).
pub type ChartKey = (ChartType, String, String);

impl ChartRecommendation {
    pub fn key(&self) -> ChartKey {
        (self.chart_type, self.x_axis.clone(), self.y_axis.clone())
    }

    /// All four fields are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.x_axis.trim().is_empty()
            && !self.y_axis.trim().is_empty()
    }
}

// =============================================================================
// Business insights
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInsights {
    pub industry_domain: String,
    /// At most three numerical column names.
    pub primary_value_columns: Vec<String>,
    pub potential_correlations: Vec<String>,
    /// Always exactly four.
    pub actionable_questions: Vec<String>,
    pub dataset_potential: String,
}

// =============================================================================
// Output
// =============================================================================

/// The output contract: exactly these two keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisOutput {
    pub charts_to_generate: Vec<ChartRecommendation>,
    pub full_analysis_report_markdown: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chart_serializes_with_contract_names() {
        let chart = ChartRecommendation {
            title: "sales by region".into(),
            chart_type: ChartType::Bar,
            x_axis: "region".into(),
            y_axis: "sales".into(),
        };
        let value = serde_json::to_value(&chart).unwrap();
        assert_eq!(
            value,
            json!({"title": "sales by region", "type": "bar", "xAxis": "region", "yAxis": "sales"})
        );
    }

    #[test]
    fn test_output_rejects_extra_keys() {
        let value = json!({
            "charts_to_generate": [],
            "full_analysis_report_markdown": "# Report",
            "extra": true
        });
        assert!(serde_json::from_value::<AnalysisOutput>(value).is_err());
    }

    #[test]
    fn test_is_missing() {
        assert!(is_missing(&Value::Null));
        assert!(is_missing(&json!("  ")));
        assert!(!is_missing(&json!(0)));
        assert!(!is_missing(&json!(false)));
    }

    #[test]
    fn test_column_values() {
        let input = AnalysisInput {
            headers: vec!["a".into(), "b".into()],
            sample_data: vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]],
        };
        assert_eq!(input.column_values(1), vec![&json!("x"), &json!("y")]);
        assert_eq!(input.row_count(), 2);
    }

    #[test]
    fn test_column_type_wire_format() {
        assert_eq!(serde_json::to_string(&ColumnType::Datetime).unwrap(), "\"datetime\"");
        assert_eq!(ChartType::parse("line"), Some(ChartType::Line));
        assert_eq!(ChartType::parse("pie"), None);
    }
}
