//! Input contract validation and data-quality scoring.
//!
//! The raw payload is checked structurally first (no partial output on any
//! violation), then scored for completeness and consistency. Hard quality
//! thresholds turn into [`AnalysisError::DataQuality`].

use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use crate::error::{AnalysisError, AnalysisResult, ErrorCode};
use crate::models::{is_missing, AnalysisInput, DataQualityMetrics};

/// Minimum number of sample rows.
pub const MIN_ROWS: usize = 2;

/// Below this completeness the sample is rejected.
pub const MIN_COMPLETENESS: f64 = 0.05;

/// Below this consistency the sample is rejected.
pub const MIN_CONSISTENCY: f64 = 0.1;

/// More accumulated issues than this and the sample is rejected.
pub const MAX_ISSUES: usize = 10;

/// Completeness under which an issue is recorded (without rejecting).
const LOW_COMPLETENESS_WARNING: f64 = 0.8;

const EMPTY_COLUMN_PENALTY: f64 = 0.1;
const MIXED_TYPES_PENALTY: f64 = 0.05;

/// Validate the raw `{headers, sampleData}` payload.
pub fn validate_input(raw: &Value) -> AnalysisResult<AnalysisInput> {
    let obj = raw.as_object().ok_or_else(|| {
        AnalysisError::input(
            ErrorCode::InvalidInput,
            "Input must be a JSON object with `headers` and `sampleData`",
            &["Send an object such as {\"headers\": [...], \"sampleData\": [[...], [...]]}"],
        )
    })?;

    let headers = validate_headers(obj.get("headers"))?;

    let rows = match obj.get("sampleData") {
        None | Some(Value::Null) => {
            return Err(AnalysisError::input(
                ErrorCode::MissingSampleData,
                "Missing `sampleData`",
                &["Provide `sampleData` as an array of rows"],
            ))
        }
        Some(Value::Array(rows)) => rows,
        Some(_) => {
            return Err(AnalysisError::input(
                ErrorCode::InvalidInput,
                "`sampleData` must be an array of rows",
                &["Each row must itself be an array of cell values"],
            ))
        }
    };

    if rows.len() < MIN_ROWS {
        return Err(AnalysisError::insufficient(
            ErrorCode::InsufficientRows,
            format!("At least {} sample rows are required, got {}", MIN_ROWS, rows.len()),
            &["Include more rows from the dataset in the sample"],
        ));
    }

    let mut sample_data = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            AnalysisError::input(
                ErrorCode::RowNotArray,
                format!("Row {} is not an array", i),
                &["Encode every row as an array of cell values"],
            )
        })?;
        if cells.len() != headers.len() {
            return Err(AnalysisError::input(
                ErrorCode::RowLengthMismatch,
                format!(
                    "Row {} has {} values but there are {} headers",
                    i,
                    cells.len(),
                    headers.len()
                ),
                &[
                    "Pad missing cells with null",
                    "Check the CSV delimiter and quoting",
                ],
            ));
        }
        sample_data.push(cells.clone());
    }

    Ok(AnalysisInput {
        headers,
        sample_data,
    })
}

fn validate_headers(raw: Option<&Value>) -> AnalysisResult<Vec<String>> {
    let items = match raw {
        None | Some(Value::Null) => {
            return Err(AnalysisError::input(
                ErrorCode::MissingHeaders,
                "Missing `headers`",
                &["Provide `headers` as an array of column names"],
            ))
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AnalysisError::input(
                ErrorCode::InvalidInput,
                "`headers` must be an array of strings",
                &["Provide `headers` as an array of column names"],
            ))
        }
    };

    if items.is_empty() {
        return Err(AnalysisError::input(
            ErrorCode::EmptyHeaders,
            "`headers` must contain at least one column name",
            &["Make sure the first CSV line holds the column names"],
        ));
    }

    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let name = item.as_str().ok_or_else(|| {
            AnalysisError::input(
                ErrorCode::InvalidHeader,
                format!("Header {} is not a string", i),
                &["Column names must be strings"],
            )
        })?;
        if name.trim().is_empty() {
            return Err(AnalysisError::input(
                ErrorCode::BlankHeader,
                format!("Header {} is blank", i),
                &["Give every column a name"],
            ));
        }
        if !seen.insert(name.trim()) {
            return Err(AnalysisError::input(
                ErrorCode::DuplicateHeader,
                format!("Duplicate header '{}'", name.trim()),
                &["Rename duplicated columns so every name is unique"],
            ));
        }
        headers.push(name.to_string());
    }

    Ok(headers)
}

/// JS-style primitive kind of a present value.
fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Bool(_) => "boolean",
        _ => "object",
    }
}

/// Score completeness and consistency of a structurally valid input.
pub fn assess_quality(input: &AnalysisInput) -> DataQualityMetrics {
    let total_cells = input.row_count() * input.column_count();
    let missing_cells = input
        .sample_data
        .iter()
        .flatten()
        .filter(|v| is_missing(v))
        .count();

    let completeness = if total_cells == 0 {
        0.0
    } else {
        (total_cells - missing_cells) as f64 / total_cells as f64
    };

    let mut consistency: f64 = 1.0;
    let mut issues = Vec::new();

    for (index, name) in input.headers.iter().enumerate() {
        let present: Vec<&Value> = input
            .column_values(index)
            .into_iter()
            .filter(|v| !is_missing(v))
            .collect();

        if present.is_empty() {
            consistency -= EMPTY_COLUMN_PENALTY;
            issues.push(format!("Column '{}' has no valid values", name));
            continue;
        }

        let kinds: BTreeSet<&str> = present.iter().map(|v| value_kind(v)).collect();
        if kinds.len() > 1 {
            consistency -= MIXED_TYPES_PENALTY;
            let kinds: Vec<&str> = kinds.into_iter().collect();
            issues.push(format!(
                "Column '{}' mixes value types ({})",
                name,
                kinds.join(", ")
            ));
        }
    }

    if completeness < LOW_COMPLETENESS_WARNING {
        issues.push(format!(
            "Low completeness: only {:.0}% of cells are populated",
            completeness * 100.0
        ));
    }

    DataQualityMetrics {
        completeness: completeness.clamp(0.0, 1.0),
        consistency: consistency.clamp(0.0, 1.0),
        issues,
    }
}

/// Apply the hard rejection thresholds.
pub fn check_quality(metrics: &DataQualityMetrics) -> AnalysisResult<()> {
    if metrics.completeness < MIN_COMPLETENESS {
        return Err(AnalysisError::quality(
            ErrorCode::LowCompleteness,
            format!(
                "Sample is too sparse: {:.1}% of cells are populated",
                metrics.completeness * 100.0
            ),
            metrics.issues.clone(),
            &["Fill in missing values or drop empty columns before analysis"],
        ));
    }
    if metrics.consistency < MIN_CONSISTENCY {
        return Err(AnalysisError::quality(
            ErrorCode::LowConsistency,
            format!("Sample is too inconsistent (score {:.2})", metrics.consistency),
            metrics.issues.clone(),
            &["Make each column hold a single kind of value"],
        ));
    }
    if metrics.issues.len() > MAX_ISSUES {
        return Err(AnalysisError::quality(
            ErrorCode::TooManyIssues,
            format!("Sample has {} data-quality issues", metrics.issues.len()),
            metrics.issues.clone(),
            &["Clean the dataset: remove empty columns and unify value types"],
        ));
    }
    Ok(())
}

/// Structural validation, scoring and threshold check in one step.
pub fn validate_and_assess(raw: &Value) -> AnalysisResult<(AnalysisInput, DataQualityMetrics)> {
    let input = validate_input(raw)?;
    let metrics = assess_quality(&input);
    check_quality(&metrics)?;
    Ok((input, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn code_of(raw: Value) -> ErrorCode {
        validate_input(&raw).unwrap_err().code()
    }

    #[test]
    fn test_valid_input() {
        let input = validate_input(&json!({
            "headers": ["product", "price"],
            "sampleData": [["iPhone", 999], ["Samsung", 899]]
        }))
        .unwrap();
        assert_eq!(input.headers, vec!["product", "price"]);
        assert_eq!(input.row_count(), 2);
    }

    #[test]
    fn test_empty_headers_rejected() {
        let err = validate_input(&json!({"headers": [], "sampleData": [[], []]})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyHeaders);
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(code_of(json!([1, 2])), ErrorCode::InvalidInput);
        assert_eq!(code_of(json!({"sampleData": []})), ErrorCode::MissingHeaders);
        assert_eq!(code_of(json!({"headers": "a,b"})), ErrorCode::InvalidInput);
        assert_eq!(code_of(json!({"headers": ["a", 1]})), ErrorCode::InvalidHeader);
        assert_eq!(code_of(json!({"headers": ["a", "  "]})), ErrorCode::BlankHeader);
        assert_eq!(code_of(json!({"headers": ["a", "a "]})), ErrorCode::DuplicateHeader);
        assert_eq!(code_of(json!({"headers": ["a"]})), ErrorCode::MissingSampleData);
        assert_eq!(
            code_of(json!({"headers": ["a"], "sampleData": [[1], "x"]})),
            ErrorCode::RowNotArray
        );
    }

    #[test]
    fn test_row_length_mismatch_rejected() {
        let err = validate_input(&json!({
            "headers": ["a", "b"],
            "sampleData": [[1, 2], [3]]
        }))
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RowLengthMismatch);
        assert!(err.to_string().contains("Row 1"));
    }

    #[test]
    fn test_single_row_is_insufficient() {
        let err = validate_input(&json!({"headers": ["a"], "sampleData": [[1]]})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientRows);
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_quality_scores() {
        let input = validate_input(&json!({
            "headers": ["a", "b", "c"],
            "sampleData": [[1, null, "x"], [2, "", 3]]
        }))
        .unwrap();
        let metrics = assess_quality(&input);

        assert!((metrics.completeness - 4.0 / 6.0).abs() < 1e-9);
        // b is empty (-0.1), c mixes string and number (-0.05)
        assert!((metrics.consistency - 0.85).abs() < 1e-9);
        assert_eq!(metrics.issues.len(), 3);
        assert!(metrics.issues[0].contains("'b'"));
        assert!(metrics.issues[1].contains("mixes"));
        assert!(check_quality(&metrics).is_ok());
    }

    #[test]
    fn test_too_sparse_rejected() {
        let headers: Vec<String> = (0..30).map(|i| format!("c{}", i)).collect();
        let mut row = vec![Value::Null; 30];
        row[0] = json!(1);
        let raw = json!({"headers": headers, "sampleData": [row.clone(), row]});

        let err = validate_and_assess(&raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::LowCompleteness);
        assert_eq!(err.kind(), ErrorKind::DataQuality);
    }

    #[test]
    fn test_low_consistency_rejected() {
        let metrics = DataQualityMetrics {
            completeness: 0.5,
            consistency: 0.05,
            issues: vec![],
        };
        assert_eq!(check_quality(&metrics).unwrap_err().code(), ErrorCode::LowConsistency);
    }

    #[test]
    fn test_too_many_issues_rejected() {
        let headers: Vec<String> = (0..12).map(|i| format!("c{}", i)).collect();
        let row: Vec<Value> = (0..12)
            .map(|i| if i % 2 == 0 { json!(1) } else { json!("x") })
            .collect();
        let flipped: Vec<Value> = (0..12)
            .map(|i| if i % 2 == 0 { json!("y") } else { json!(2) })
            .collect();
        let raw = json!({"headers": headers, "sampleData": [row, flipped]});

        let err = validate_and_assess(&raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TooManyIssues);
    }

    #[test]
    fn test_consistency_floor() {
        let headers: Vec<String> = (0..12).map(|i| format!("c{}", i)).collect();
        let input = AnalysisInput {
            headers,
            sample_data: vec![vec![Value::Null; 12], vec![Value::Null; 12]],
        };
        let metrics = assess_quality(&input);
        assert_eq!(metrics.consistency, 0.0);
        assert_eq!(metrics.completeness, 0.0);
    }
}
