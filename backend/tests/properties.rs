//! Property-based tests for the analysis pipeline.
//!
//! Random small tables are pushed through the public entry points to check
//! the invariants every output must satisfy:
//! - at most 100 charts, no duplicate (type, xAxis, yAxis)
//! - a non-empty report that fits the character cap
//! - stable under a JSON round trip
//! - identical for identical input
//! - row/header mismatches rejected before any output is built

use datalens::{analyze, check_compliance, format_output, repair_output, ErrorCode, FormatMode};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

// ============================================================================
// Strategies
// ============================================================================

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => (-1000i64..1000).prop_map(|n| json!(n)),
        2 => prop::sample::select(vec!["north", "south", "east", "west"]).prop_map(|s| json!(s)),
        1 => prop::sample::select(vec!["2024-01-15", "2023-12-01", "2024/03/09"]).prop_map(|s| json!(s)),
        1 => "[a-z ]{0,24}".prop_map(|s| json!(s)),
        1 => Just(Value::Null),
    ]
}

/// A well-formed `{headers, sampleData}` payload.
fn payload() -> impl Strategy<Value = (usize, Vec<Vec<Value>>)> {
    (1usize..7, 2usize..9).prop_flat_map(|(cols, rows)| {
        (
            Just(cols),
            prop::collection::vec(prop::collection::vec(cell(), cols), rows),
        )
    })
}

fn to_input(cols: usize, rows: &[Vec<Value>]) -> Value {
    let headers: Vec<String> = (0..cols).map(|i| format!("col_{}", i)).collect();
    json!({ "headers": headers, "sampleData": rows })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_output_invariants((cols, rows) in payload()) {
        let input = to_input(cols, &rows);

        match analyze(&input) {
            Ok(output) => {
                prop_assert!(output.charts_to_generate.len() <= 100);

                let keys: HashSet<_> = output.charts_to_generate.iter().map(|c| c.key()).collect();
                prop_assert_eq!(keys.len(), output.charts_to_generate.len());

                let report = &output.full_analysis_report_markdown;
                prop_assert!(!report.is_empty());
                prop_assert!(report.chars().count() <= 50_000);

                let text = serde_json::to_string(&output).unwrap();
                let value: Value = serde_json::from_str(&text).unwrap();
                prop_assert_eq!(serde_json::to_string(&value).unwrap(), text);
                prop_assert!(check_compliance(&value).compliant);
            }
            // Random samples may legitimately fail the quality gate.
            Err(e) => prop_assert!(matches!(
                e.code(),
                ErrorCode::LowCompleteness | ErrorCode::LowConsistency | ErrorCode::TooManyIssues
            )),
        }
    }

    #[test]
    fn prop_deterministic((cols, rows) in payload()) {
        let input = to_input(cols, &rows);
        let first = analyze(&input).map_err(|e| e.code());
        let second = analyze(&input).map_err(|e| e.code());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_row_mismatch_rejected((cols, mut rows) in payload(), pick in any::<prop::sample::Index>()) {
        let i = pick.index(rows.len());
        rows[i].push(json!("extra"));
        let err = analyze(&to_input(cols, &rows)).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::RowLengthMismatch);
    }

    #[test]
    fn prop_robust_output_is_strictly_valid(report in ".{0,200}", titles in prop::collection::vec("[ a-z]{0,8}", 0..10)) {
        let charts: Vec<Value> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| json!({ "title": t, "type": "bar", "xAxis": format!("x{}", i % 3), "yAxis": "y" }))
            .collect();
        let candidate = json!({ "charts_to_generate": charts, "full_analysis_report_markdown": report });

        let repaired = repair_output(&candidate);
        let value = serde_json::to_value(&repaired.output).unwrap();
        prop_assert!(format_output(&value, FormatMode::Strict).is_ok());
    }
}
