//! # Datalens - Exploratory analysis of tabular samples
//!
//! Datalens turns a small sample of a table (headers + rows) into a bounded,
//! deduplicated list of chart recommendations and a markdown business
//! intelligence report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────┐
//! │  Input   │──▶│ Validate │──▶│  Column  │──▶│ Charts       │──▶│  Report  │──▶│  Output  │
//! │ contract │   │ + score  │   │  types   │   │ + Insights   │   │ sections │   │ contract │
//! └──────────┘   └──────────┘   └──────────┘   └──────────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use datalens::analyze;
//! use serde_json::json;
//!
//! let output = analyze(&json!({
//!     "headers": ["product", "price", "sales"],
//!     "sampleData": [["iPhone", 999, 1500], ["Samsung", 899, 1200]]
//! })).unwrap();
//! assert!(output.full_analysis_report_markdown.starts_with("# Executive Summary"));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Classified error types
//! - [`models`] - Input/output contracts and column metadata
//! - [`config`] - Budgets and heuristic thresholds
//! - [`parser`] - CSV to input contract, with auto-detection
//! - [`validation`] - Input validation and output contract enforcement
//! - [`analysis`] - Type inference, charts, insights, report, pipeline
//! - [`cache`] - Per-call chart dedup context
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Analysis
pub mod analysis;

// Chart dedup
pub mod cache;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AnalysisError, AnalysisResult, CsvError, CsvResult, ErrorCode, ErrorKind, ServerError,
    ServerResult,
};

// =============================================================================
// Re-exports - Models and configuration
// =============================================================================

pub use config::{AnalysisOptions, Thresholds};
pub use models::{
    AnalysisInput, AnalysisOutput, BusinessInsights, ChartRecommendation, ChartType, ColumnInfo,
    ColumnType, DataQualityMetrics,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    ParsedCsv, DEFAULT_SAMPLE_ROWS,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    assess_quality, check_compliance, check_quality, format_output, is_valid_analysis_output,
    repair_output, validate_input, validate_output, ComplianceReport, FormatMode, Formatted,
};

// =============================================================================
// Re-exports - Analysis
// =============================================================================

pub use analysis::{
    analyze, analyze_batch, analyze_batch_with_options, analyze_columns, analyze_csv_bytes,
    analyze_csv_file, analyze_detailed, analyze_with_options, extract_insights, generate_charts,
    CsvAnalysis, Deadline, DetailedAnalysis, PipelineError,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{analysis_error_response, error_response, status_for, AnalyzeResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, router_with, start_server, AppState};
}
