//! Input and output contract validation.
//!
//! - [`input`] checks the raw `{headers, sampleData}` payload and scores its
//!   quality before any analysis runs.
//! - [`output`] enforces the two-key output contract, strictly or by
//!   repairing what it can.
//!
//! # Embedded Schema
//!
//! The output contract is also described as a JSON Schema (Draft 7),
//! embedded at compile time from `schemas/analysis-output.json`.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use datalens::validation::{is_valid_analysis_output, validate_analysis_output_schema};
//!
//! let output = json!({
//!     "charts_to_generate": [
//!         { "title": "sales by region", "type": "bar", "xAxis": "region", "yAxis": "sales" }
//!     ],
//!     "full_analysis_report_markdown": "# Executive Summary\n\n..."
//! });
//! assert!(is_valid_analysis_output(&output));
//! assert!(validate_analysis_output_schema(&json!({})).is_err());
//! ```

pub mod input;
pub mod output;

use once_cell::sync::Lazy;
use serde_json::Value;

pub use input::{assess_quality, check_quality, validate_and_assess, validate_input};
pub use output::{check_compliance, format_output, repair_output, validate_output, ComplianceReport, FormatMode, Formatted};

static OUTPUT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/analysis-output.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a schema.
///
/// Returns every violation message when invalid.
///
/// ```ignore
/// use serde_json::json;
/// use datalens::validation::validate;
///
/// let schema = json!({ "type": "object", "required": ["name"] });
/// assert!(validate(&schema, &json!({ "name": "test" })).is_ok());
/// assert!(validate(&schema, &json!({ "age": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the embedded output schema.
pub fn validate_analysis_output_schema(data: &Value) -> Result<(), Vec<String>> {
    validate(&OUTPUT_SCHEMA, data)
}

pub fn is_valid_analysis_output(data: &Value) -> bool {
    is_valid(&OUTPUT_SCHEMA, data)
}
