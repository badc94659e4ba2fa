//! Output contract enforcement.
//!
//! Strict mode rejects any violation with an
//! [`AnalysisError::OutputFormatting`]. Robust mode never fails: it keeps
//! every well-formed chart, rebuilds the report when needed and returns the
//! repaired output together with a list of warnings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::validate_analysis_output_schema;
use crate::analysis::report::{normalize_report, truncate_chars, FALLBACK_REPORT};
use crate::config::{MAX_CHARTS, MAX_REPORT_CHARS};
use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{AnalysisOutput, ChartRecommendation, ChartType};

pub const CHARTS_KEY: &str = "charts_to_generate";
pub const REPORT_KEY: &str = "full_analysis_report_markdown";

/// Reports above this share of the cap get a size warning.
const REPORT_SIZE_WARNING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    #[default]
    Strict,
    Robust,
}

impl FormatMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "robust" => Some(Self::Robust),
            _ => None,
        }
    }
}

/// A contract-conforming output and what had to change to get it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Formatted {
    pub output: AnalysisOutput,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// =============================================================================
// Strict
// =============================================================================

fn round_trip_violation(value: &Value) -> Option<String> {
    let first = match serde_json::to_string(value) {
        Ok(s) => s,
        Err(e) => return Some(format!("Output is not serializable: {}", e)),
    };
    let parsed: Value = match serde_json::from_str(&first) {
        Ok(v) => v,
        Err(e) => return Some(format!("Serialized output does not parse: {}", e)),
    };
    match serde_json::to_string(&parsed) {
        Ok(second) if second == first => None,
        Ok(_) => Some("Output is not stable under a JSON round trip".to_string()),
        Err(e) => Some(format!("Output is not serializable: {}", e)),
    }
}

fn duplicate_violations(value: &Value) -> Vec<String> {
    let Some(charts) = value.get(CHARTS_KEY).and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for (i, chart) in charts.iter().enumerate() {
        let key = (
            chart.get("type").and_then(Value::as_str),
            chart.get("xAxis").and_then(Value::as_str),
            chart.get("yAxis").and_then(Value::as_str),
        );
        if !seen.insert(key) {
            violations.push(format!("Chart {} duplicates an earlier (type, xAxis, yAxis)", i));
        }
    }
    violations
}

/// Every contract violation of a candidate output, empty when compliant.
pub fn contract_violations(value: &Value) -> Vec<String> {
    let mut violations = match validate_analysis_output_schema(value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };
    violations.extend(duplicate_violations(value));
    violations.extend(round_trip_violation(value));
    violations
}

/// Strict validation, returning the typed output.
pub fn validate_output(value: &Value) -> AnalysisResult<AnalysisOutput> {
    let violations = contract_violations(value);
    if !violations.is_empty() {
        return Err(AnalysisError::formatting(violations));
    }

    let output: AnalysisOutput = serde_json::from_value(value.clone())
        .map_err(|e| AnalysisError::formatting(vec![e.to_string()]))?;

    let rebuilt = serde_json::to_value(&output)
        .map_err(|e| AnalysisError::formatting(vec![e.to_string()]))?;
    if &rebuilt != value {
        return Err(AnalysisError::formatting(vec![
            "Output changes when rebuilt from its typed form".to_string(),
        ]));
    }
    Ok(output)
}

// =============================================================================
// Robust
// =============================================================================

fn non_blank_str<'a>(chart: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    chart
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn chart_from_value(value: &Value) -> Option<ChartRecommendation> {
    let chart = value.as_object()?;
    Some(ChartRecommendation {
        title: non_blank_str(chart, "title")?.to_string(),
        chart_type: ChartType::parse(non_blank_str(chart, "type")?)?,
        x_axis: non_blank_str(chart, "xAxis")?.to_string(),
        y_axis: non_blank_str(chart, "yAxis")?.to_string(),
    })
}

fn repair_charts(value: Option<&Value>, warnings: &mut Vec<String>) -> Vec<ChartRecommendation> {
    let Some(items) = value.and_then(Value::as_array) else {
        warnings.push(format!("'{}' is missing or not an array, using no charts", CHARTS_KEY));
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut charts = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match chart_from_value(item) {
            Some(chart) if seen.insert(chart.key()) => charts.push(chart),
            Some(_) => warnings.push(format!("Dropped duplicate chart at index {}", i)),
            None => warnings.push(format!("Dropped malformed chart at index {}", i)),
        }
    }

    if charts.len() > MAX_CHARTS {
        warnings.push(format!(
            "Chart list capped at {} ({} dropped)",
            MAX_CHARTS,
            charts.len() - MAX_CHARTS
        ));
        charts.truncate(MAX_CHARTS);
    }
    charts
}

fn repair_report(value: Option<&Value>, warnings: &mut Vec<String>) -> String {
    let cleaned = match value.and_then(Value::as_str) {
        Some(raw) => {
            let normalized = normalize_report(raw);
            let cleaned = truncate_chars(&normalized, MAX_REPORT_CHARS);
            if normalized.chars().count() > MAX_REPORT_CHARS {
                warnings.push(format!("Report truncated to {} characters", MAX_REPORT_CHARS));
            } else if !cleaned.is_empty() && cleaned != raw {
                warnings.push("Report text was normalized".to_string());
            }
            cleaned
        }
        None => String::new(),
    };

    if cleaned.is_empty() {
        warnings.push("Report is missing or empty, using fallback report".to_string());
        return FALLBACK_REPORT.to_string();
    }
    cleaned
}

/// Self-healing formatting. Never fails.
pub fn repair_output(value: &Value) -> Formatted {
    let mut warnings = Vec::new();

    match value.as_object() {
        Some(object) => {
            for key in object.keys().filter(|k| *k != CHARTS_KEY && *k != REPORT_KEY) {
                warnings.push(format!("Dropped unexpected key '{}'", key));
            }
        }
        None => warnings.push("Output is not an object, rebuilding it".to_string()),
    }

    let charts_to_generate = repair_charts(value.get(CHARTS_KEY), &mut warnings);
    let full_analysis_report_markdown = repair_report(value.get(REPORT_KEY), &mut warnings);

    Formatted {
        output: AnalysisOutput {
            charts_to_generate,
            full_analysis_report_markdown,
        },
        warnings,
    }
}

/// Format a candidate output in the given mode.
pub fn format_output(value: &Value, mode: FormatMode) -> AnalysisResult<Formatted> {
    match mode {
        FormatMode::Strict => validate_output(value).map(|output| Formatted {
            output,
            warnings: Vec::new(),
        }),
        FormatMode::Robust => Ok(repair_output(value)),
    }
}

// =============================================================================
// Compliance
// =============================================================================

fn has_unsafe_chars(text: &str) -> bool {
    text.chars().any(|c| {
        (c.is_control() && c != '\n' && c != '\t') || c == '\u{2028}' || c == '\u{2029}'
    })
}

/// Pre-flight check. Reports contract errors plus softer warnings without
/// touching the input.
pub fn check_compliance(value: &Value) -> ComplianceReport {
    let errors = contract_violations(value);
    let mut warnings = Vec::new();

    if let Some(charts) = value.get(CHARTS_KEY).and_then(Value::as_array) {
        if charts.is_empty() {
            warnings.push("No charts are recommended".to_string());
        }
        for (i, chart) in charts.iter().enumerate() {
            let x = chart.get("xAxis").and_then(Value::as_str);
            let y = chart.get("yAxis").and_then(Value::as_str);
            if x.is_some() && x == y && y != Some("Count") {
                warnings.push(format!("Chart {} plots a column against itself", i));
            }
        }
    }

    if let Some(report) = value.get(REPORT_KEY).and_then(Value::as_str) {
        let len = report.chars().count();
        if len as f64 > MAX_REPORT_CHARS as f64 * REPORT_SIZE_WARNING_RATIO && len <= MAX_REPORT_CHARS {
            warnings.push(format!("Report is close to the {} character limit", MAX_REPORT_CHARS));
        }
        if !report.contains("# Executive Summary") {
            warnings.push("Report has no '# Executive Summary' heading".to_string());
        }
        if report.contains('\r') || has_unsafe_chars(report) {
            warnings.push("Report contains characters that robust formatting would remove".to_string());
        }
    }

    ComplianceReport {
        compliant: errors.is_empty(),
        errors,
        warnings,
    }
}
