//! High-level analysis API.
//!
//! Runs every stage on one dataset sample: input validation and quality
//! scoring, column typing, chart generation, insight extraction, report
//! assembly and output contract enforcement.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use datalens::analyze;
//!
//! let output = analyze(&json!({
//!     "headers": ["product", "price", "sales"],
//!     "sampleData": [["iPhone", 999, 1500], ["Samsung", 899, 1200]]
//! }))?;
//! println!("{} charts", output.charts_to_generate.len());
//! ```

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::charts::generate_charts;
use super::column_types::analyze_columns;
use super::insights::extract_insights;
use super::report::{assemble_report, ReportContext};
use crate::api::logs::{log_stage, LogLevel};
use crate::config::AnalysisOptions;
use crate::error::{AnalysisError, AnalysisResult, CsvError, ErrorCode};
use crate::models::{AnalysisOutput, BusinessInsights, ColumnInfo, DataQualityMetrics};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParsedCsv};
use crate::validation::{repair_output, validate_and_assess, validate_output};

/// Errors of the CSV-to-analysis entry points.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

// =============================================================================
// Deadline
// =============================================================================

/// Cooperative wall-clock budget, checked between stages.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    phase: &'static str,
    started: Instant,
    budget: Duration,
    code: ErrorCode,
}

impl Deadline {
    pub fn start(phase: &'static str, budget: Duration, code: ErrorCode) -> Self {
        Self {
            phase,
            started: Instant::now(),
            budget,
            code,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Fails with a timeout once the budget is spent.
    pub fn check(&self) -> AnalysisResult<()> {
        if self.is_expired() {
            log_stage(
                LogLevel::Error,
                "timeout",
                format!("{} exceeded {} ms", self.phase, self.budget.as_millis()),
            );
            return Err(AnalysisError::timeout(
                self.code,
                self.phase,
                u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Results
// =============================================================================

/// Output plus the intermediate artifacts it was built from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub output: AnalysisOutput,
    pub columns: Vec<ColumnInfo>,
    pub quality: DataQualityMetrics,
    pub insights: BusinessInsights,
    /// Repairs applied by the output formatter, if any.
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub sample_rows: usize,
    pub total_rows: usize,
}

impl From<&ParsedCsv> for CsvInfo {
    fn from(parsed: &ParsedCsv) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.input.headers.clone(),
            sample_rows: parsed.input.row_count(),
            total_rows: parsed.total_rows,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvAnalysis {
    pub csv_info: CsvInfo,
    pub analysis: DetailedAnalysis,
}

// =============================================================================
// Entry points
// =============================================================================

/// Analyze one `{headers, sampleData}` payload with default options.
pub fn analyze(raw: &Value) -> AnalysisResult<AnalysisOutput> {
    analyze_with_options(raw, &AnalysisOptions::default())
}

pub fn analyze_with_options(raw: &Value, options: &AnalysisOptions) -> AnalysisResult<AnalysisOutput> {
    analyze_detailed(raw, options).map(|detailed| detailed.output)
}

/// Run the full pipeline, keeping the intermediate artifacts.
///
/// Input and quality errors are returned as-is. Chart, insight and report
/// failures are recovered inside their stages. Exceeding the overall or
/// report budget fails with [`AnalysisError::Timeout`].
pub fn analyze_detailed(raw: &Value, options: &AnalysisOptions) -> AnalysisResult<DetailedAnalysis> {
    let overall = Deadline::start("Analysis", options.timeout(), ErrorCode::AnalysisTimeout);

    log_stage(LogLevel::Info, "validation", "Validating input...");
    let (input, quality) = validate_and_assess(raw).map_err(|e| {
        log_stage(LogLevel::Error, "validation", format!("[{}] {}", e.code(), e));
        e
    })?;
    log_stage(
        LogLevel::Success,
        "validation",
        format!(
            "{} columns x {} rows, completeness {:.0}%, consistency {:.0}%",
            input.column_count(),
            input.row_count(),
            quality.completeness * 100.0,
            quality.consistency * 100.0
        ),
    );
    overall.check()?;

    let columns = analyze_columns(&input, &options.thresholds);
    for column in &columns {
        log_stage(
            LogLevel::Info,
            "columns",
            format!("{}: {} ({} unique)", column.name, column.inferred_type, column.unique_value_count),
        );
    }
    overall.check()?;

    let charts = generate_charts(&columns, options);
    overall.check()?;

    let insights = extract_insights(&columns, &quality);
    overall.check()?;

    let ctx = ReportContext {
        columns: &columns,
        quality: &quality,
        insights: &insights,
    };
    let report = assemble_report(&ctx, options, &overall)?;
    overall.check()?;

    let (output, warnings) = finalize(AnalysisOutput {
        charts_to_generate: charts,
        full_analysis_report_markdown: report,
    });

    let elapsed_ms = u64::try_from(overall.elapsed().as_millis()).unwrap_or(u64::MAX);
    log_stage(
        LogLevel::Success,
        "output",
        format!("{} charts, report ready in {} ms", output.charts_to_generate.len(), elapsed_ms),
    );

    Ok(DetailedAnalysis {
        output,
        columns,
        quality,
        insights,
        warnings,
        elapsed_ms,
    })
}

/// Strict contract check, falling back to robust repair.
fn finalize(candidate: AnalysisOutput) -> (AnalysisOutput, Vec<String>) {
    let value = match serde_json::to_value(&candidate) {
        Ok(value) => value,
        Err(e) => {
            log_stage(LogLevel::Warning, "output", format!("Output not serializable: {}", e));
            Value::Null
        }
    };

    match validate_output(&value) {
        Ok(output) => (output, Vec::new()),
        Err(e) => {
            log_stage(LogLevel::Warning, "output", format!("{}, repairing", e));
            let formatted = repair_output(&value);
            for warning in &formatted.warnings {
                log_stage(LogLevel::Warning, "output", warning.clone());
            }
            (formatted.output, formatted.warnings)
        }
    }
}

/// Analyze several payloads independently. One failure never stops the
/// others; results keep the input order.
pub fn analyze_batch(inputs: &[Value]) -> Vec<AnalysisResult<AnalysisOutput>> {
    analyze_batch_with_options(inputs, &AnalysisOptions::default())
}

pub fn analyze_batch_with_options(
    inputs: &[Value],
    options: &AnalysisOptions,
) -> Vec<AnalysisResult<AnalysisOutput>> {
    let results: Vec<_> = inputs
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            log_stage(LogLevel::Info, "batch", format!("Dataset {}/{}", i + 1, inputs.len()));
            analyze_with_options(raw, options)
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    let level = if failed == 0 { LogLevel::Success } else { LogLevel::Warning };
    log_stage(
        level,
        "batch",
        format!("{} succeeded, {} failed", results.len() - failed, failed),
    );
    results
}

/// Parse a CSV file and analyze its sample.
pub fn analyze_csv_file(path: &Path, options: &AnalysisOptions, max_rows: usize) -> Result<CsvAnalysis, PipelineError> {
    let parsed = parse_csv_file_auto(path, max_rows)?;
    analyze_parsed(parsed, options)
}

/// Same as [`analyze_csv_file`] for in-memory bytes.
pub fn analyze_csv_bytes(bytes: &[u8], options: &AnalysisOptions, max_rows: usize) -> Result<CsvAnalysis, PipelineError> {
    let parsed = parse_bytes_auto(bytes, max_rows)?;
    analyze_parsed(parsed, options)
}

fn analyze_parsed(parsed: ParsedCsv, options: &AnalysisOptions) -> Result<CsvAnalysis, PipelineError> {
    let csv_info = CsvInfo::from(&parsed);
    log_stage(
        LogLevel::Success,
        "csv",
        format!(
            "Encoding {}, separator '{}', {} of {} rows sampled",
            csv_info.encoding,
            format_delimiter(csv_info.delimiter),
            csv_info.sample_rows,
            csv_info.total_rows
        ),
    );

    let raw = serde_json::to_value(&parsed.input)
        .map_err(|e| PipelineError::Csv(CsvError::IoError(std::io::Error::other(e))))?;
    let analysis = analyze_detailed(&raw, options)?;
    Ok(CsvAnalysis { csv_info, analysis })
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_table() -> Value {
        json!({
            "headers": ["product", "price", "sales"],
            "sampleData": [["iPhone", 999, 1500], ["Samsung", 899, 1200]]
        })
    }

    #[test]
    fn test_deadline() {
        let spent = Deadline::start("Analysis", Duration::ZERO, ErrorCode::AnalysisTimeout);
        let err = spent.check().unwrap_err();
        assert_eq!(err.code(), ErrorCode::AnalysisTimeout);

        let fresh = Deadline::start("Analysis", Duration::from_secs(60), ErrorCode::AnalysisTimeout);
        assert!(fresh.check().is_ok());
    }

    #[test]
    fn test_analyze_detailed() {
        let detailed = analyze_detailed(&product_table(), &AnalysisOptions::default()).unwrap();
        assert_eq!(detailed.columns.len(), 3);
        assert!(detailed.warnings.is_empty());
        assert!(detailed
            .output
            .full_analysis_report_markdown
            .starts_with("# Executive Summary"));
        assert_eq!(detailed.insights.industry_domain, "E-commerce & Retail");
    }

    #[test]
    fn test_overall_timeout() {
        let options = AnalysisOptions {
            timeout_ms: 0,
            ..AnalysisOptions::default()
        };
        let err = analyze_with_options(&product_table(), &options).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AnalysisTimeout);
    }

    #[test]
    fn test_finalize_repairs_oversized_output() {
        let candidate = AnalysisOutput {
            charts_to_generate: vec![],
            full_analysis_report_markdown: "x".repeat(60_000),
        };
        let (output, warnings) = finalize(candidate);
        assert_eq!(output.full_analysis_report_markdown.chars().count(), 50_000);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_batch_tolerates_failures() {
        let results = analyze_batch(&[product_table(), json!({ "headers": [] }), product_table()]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().code(), ErrorCode::EmptyHeaders);
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_analyze_csv_bytes() {
        let csv = b"region;revenue\nnorth;100\nsouth;200\nnorth;150\n";
        let result = analyze_csv_bytes(csv, &AnalysisOptions::default(), 100).unwrap();
        assert_eq!(result.csv_info.delimiter, ';');
        assert_eq!(result.csv_info.total_rows, 3);
        assert!(!result.analysis.output.charts_to_generate.is_empty());
    }
}
