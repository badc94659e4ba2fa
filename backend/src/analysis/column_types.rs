//! Column type inference.
//!
//! A column's type is decided by an ordered rule table evaluated top to
//! bottom; the first matching rule wins and anything left over is
//! [`ColumnType::Text`]. The order is the tie-break policy:
//!
//! ```text
//! numerical  ≥ 80% of present values parse as finite numbers
//! datetime   ≥ 70% of present values are date-like strings
//! categorical unique ratio ≤ 0.7, ≥ 2 present values, avg length ≤ 10
//! text       otherwise (and for columns without any present value)
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::config::Thresholds;
use crate::models::{is_missing, AnalysisInput, ColumnInfo, ColumnType, SAMPLE_VALUES_PER_COLUMN};

/// Digit groups separated by `-`, `/` or `.` at the start of the value.
static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}").expect("valid date regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y",
    "%d.%m.%Y", "%m/%d/%y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Value as a finite number, accepting numeric strings.
pub fn as_finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// True for strings that match the digit-group pattern and parse as a date.
pub fn is_date_like(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    let s = s.trim();
    if !DATE_PATTERN.is_match(s) {
        return false;
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || DATE_FORMATS
            .iter()
            .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
}

/// Display form used for uniqueness and length statistics.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Aggregates over the present (non-missing) values of one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnProfile {
    pub present: usize,
    pub numeric: usize,
    pub dates: usize,
    pub unique: usize,
    pub avg_len: f64,
}

impl ColumnProfile {
    pub fn from_values(values: &[&Value]) -> Self {
        let present: Vec<&Value> = values.iter().copied().filter(|v| !is_missing(v)).collect();
        if present.is_empty() {
            return Self::default();
        }

        let displays: Vec<String> = present.iter().map(|v| display_value(v)).collect();
        let unique = displays.iter().collect::<HashSet<_>>().len();
        let total_len: usize = displays.iter().map(|s| s.chars().count()).sum();

        Self {
            present: present.len(),
            numeric: present.iter().filter(|v| as_finite_number(v).is_some()).count(),
            dates: present.iter().filter(|v| is_date_like(v)).count(),
            unique,
            avg_len: total_len as f64 / present.len() as f64,
        }
    }

    fn ratio(&self, count: usize) -> f64 {
        if self.present == 0 {
            0.0
        } else {
            count as f64 / self.present as f64
        }
    }

    pub fn unique_ratio(&self) -> f64 {
        self.ratio(self.unique)
    }
}

/// One entry of the type cascade.
pub struct TypeRule {
    pub name: &'static str,
    pub result: ColumnType,
    pub matches: fn(&ColumnProfile, &Thresholds) -> bool,
}

/// Evaluated top to bottom, first match wins.
pub const TYPE_RULES: [TypeRule; 3] = [
    TypeRule {
        name: "mostly-numeric",
        result: ColumnType::Numerical,
        matches: |p, t| p.ratio(p.numeric) >= t.numerical_ratio,
    },
    TypeRule {
        name: "mostly-dates",
        result: ColumnType::Datetime,
        matches: |p, t| p.ratio(p.dates) >= t.datetime_ratio,
    },
    TypeRule {
        name: "low-cardinality-short",
        result: ColumnType::Categorical,
        matches: |p, t| {
            p.unique_ratio() <= t.categorical_unique_ratio
                && p.present >= t.categorical_min_samples
                && p.avg_len <= t.categorical_max_avg_len
        },
    },
];

/// Apply the rule table to a profile.
pub fn classify(profile: &ColumnProfile, thresholds: &Thresholds) -> ColumnType {
    if profile.present == 0 {
        return ColumnType::Text;
    }
    TYPE_RULES
        .iter()
        .find(|rule| (rule.matches)(profile, thresholds))
        .map(|rule| rule.result)
        .unwrap_or(ColumnType::Text)
}

/// Infer the type of a column from its raw values.
pub fn infer_column_type(values: &[&Value], thresholds: &Thresholds) -> ColumnType {
    classify(&ColumnProfile::from_values(values), thresholds)
}

/// Build [`ColumnInfo`] for every column of the input.
pub fn analyze_columns(input: &AnalysisInput, thresholds: &Thresholds) -> Vec<ColumnInfo> {
    input
        .headers
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let values = input.column_values(index);
            let profile = ColumnProfile::from_values(&values);

            ColumnInfo {
                name: name.clone(),
                inferred_type: classify(&profile, thresholds),
                unique_value_count: profile.unique,
                has_missing: values.iter().any(|v| is_missing(v)),
                sample_values: values
                    .iter()
                    .take(SAMPLE_VALUES_PER_COLUMN)
                    .map(|v| (*v).clone())
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn infer(values: Vec<Value>) -> ColumnType {
        let refs: Vec<&Value> = values.iter().collect();
        infer_column_type(&refs, &Thresholds::default())
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = TYPE_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["mostly-numeric", "mostly-dates", "low-cardinality-short"]);
        let results: Vec<ColumnType> = TYPE_RULES.iter().map(|r| r.result).collect();
        assert_eq!(
            results,
            vec![ColumnType::Numerical, ColumnType::Datetime, ColumnType::Categorical]
        );
    }

    #[test]
    fn test_numerical() {
        assert_eq!(infer(vec![json!(999), json!(899)]), ColumnType::Numerical);
        assert_eq!(infer(vec![json!("1.5"), json!(" 2 "), json!(3)]), ColumnType::Numerical);
        // 4 of 5 numeric is exactly 80%
        assert_eq!(
            infer(vec![json!(1), json!(2), json!(3), json!(4), json!("n/a")]),
            ColumnType::Numerical
        );
    }

    #[test]
    fn test_non_finite_strings_are_not_numbers() {
        assert_eq!(as_finite_number(&json!("inf")), None);
        assert_eq!(as_finite_number(&json!("NaN")), None);
        assert_eq!(as_finite_number(&json!(true)), None);
        assert_eq!(as_finite_number(&json!("1e3")), Some(1000.0));
    }

    #[test]
    fn test_datetime() {
        assert_eq!(
            infer(vec![json!("2024-01-15"), json!("2024-02-15"), json!("2024-03-15")]),
            ColumnType::Datetime
        );
        assert_eq!(
            infer(vec![json!("01/15/2024"), json!("2024-02-15T10:00:00Z")]),
            ColumnType::Datetime
        );
    }

    #[test]
    fn test_date_needs_digit_groups() {
        assert!(is_date_like(&json!("2024-01-15")));
        assert!(!is_date_like(&json!("January 15, 2024")));
        assert!(!is_date_like(&json!("2024-13-45")));
        assert!(!is_date_like(&json!(20240115)));
    }

    #[test]
    fn test_categorical() {
        let values = vec![json!("north"), json!("south"), json!("north"), json!("south")];
        assert_eq!(infer(values), ColumnType::Categorical);
    }

    #[test]
    fn test_unique_short_strings_are_text() {
        assert_eq!(infer(vec![json!("iPhone"), json!("Samsung")]), ColumnType::Text);
    }

    #[test]
    fn test_long_repeated_strings_are_text() {
        let long = "a rather long free-form description";
        assert_eq!(infer(vec![json!(long), json!(long), json!(long)]), ColumnType::Text);
    }

    #[test]
    fn test_empty_column_is_text() {
        assert_eq!(infer(vec![Value::Null, json!("")]), ColumnType::Text);
    }

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| json!(s)).collect()
    }

    #[test]
    fn test_unique_ratio_boundary() {
        // 7 unique of 10
        let at = strings(&["a", "b", "c", "d", "e", "f", "g", "a", "b", "c"]);
        assert_eq!(infer(at), ColumnType::Categorical);

        // 8 unique of 10
        let above = strings(&["a", "b", "c", "d", "e", "f", "g", "h", "a", "b"]);
        assert_eq!(infer(above), ColumnType::Text);
    }

    #[test]
    fn test_average_length_boundary() {
        let ten = "abcdefghij";
        assert_eq!(infer(strings(&[ten, ten, ten])), ColumnType::Categorical);

        let eleven = "abcdefghijk";
        assert_eq!(infer(strings(&[eleven, eleven, eleven])), ColumnType::Text);
    }

    #[test]
    fn test_minimum_samples_boundary() {
        let thresholds = Thresholds {
            categorical_unique_ratio: 1.0,
            ..Thresholds::default()
        };
        let one = vec![json!("x"), Value::Null];
        let two = vec![json!("x"), json!("y")];

        let refs: Vec<&Value> = one.iter().collect();
        assert_eq!(infer_column_type(&refs, &thresholds), ColumnType::Text);
        let refs: Vec<&Value> = two.iter().collect();
        assert_eq!(infer_column_type(&refs, &thresholds), ColumnType::Categorical);
    }

    #[test]
    fn test_datetime_ratio_boundary() {
        let dates = [
            "2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05", "2024-01-06",
            "2024-01-07",
        ];

        let mut at: Vec<&str> = dates.to_vec();
        at.extend(["pending", "pending", "pending"]);
        assert_eq!(infer(strings(&at)), ColumnType::Datetime);

        let mut below: Vec<&str> = dates[..6].to_vec();
        below.extend(["pending", "pending", "pending", "pending"]);
        assert_ne!(infer(strings(&below)), ColumnType::Datetime);
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let values = vec![json!(1), json!(2), json!("x"), json!("y")];
        let refs: Vec<&Value> = values.iter().collect();
        let loose = Thresholds {
            numerical_ratio: 0.5,
            ..Thresholds::default()
        };
        assert_eq!(infer_column_type(&refs, &loose), ColumnType::Numerical);
        assert_ne!(infer_column_type(&refs, &Thresholds::default()), ColumnType::Numerical);
    }

    #[test]
    fn test_analyze_columns() {
        let input = AnalysisInput {
            headers: vec!["product".into(), "price".into(), "sales".into()],
            sample_data: vec![
                vec![json!("iPhone"), json!(999), json!(1500)],
                vec![json!("Samsung"), json!(899), Value::Null],
            ],
        };
        let columns = analyze_columns(&input, &Thresholds::default());

        assert_eq!(columns[0].inferred_type, ColumnType::Text);
        assert_eq!(columns[1].inferred_type, ColumnType::Numerical);
        assert_eq!(columns[2].inferred_type, ColumnType::Numerical);
        assert_eq!(columns[0].unique_value_count, 2);
        assert!(columns[2].has_missing);
        assert!(!columns[1].has_missing);
        assert_eq!(columns[1].sample_values, vec![json!(999), json!(899)]);
    }
}
