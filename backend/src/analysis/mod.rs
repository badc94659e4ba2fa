//! Analysis stages and the pipeline that chains them.
//!
//! - [`column_types`] - Rule-table type inference per column
//! - [`charts`] - Diversity-constrained chart recommendations
//! - [`insights`] - Heuristic business insights
//! - [`report`] - Sectioned markdown report
//! - [`pipeline`] - Entry points and deadlines

pub mod charts;
pub mod column_types;
pub mod insights;
pub mod pipeline;
pub mod report;

pub use charts::{fallback_charts, generate_charts, ChartAspect};
pub use column_types::{analyze_columns, infer_column_type};
pub use insights::extract_insights;
pub use pipeline::{
    analyze, analyze_batch, analyze_batch_with_options, analyze_csv_bytes, analyze_csv_file,
    analyze_detailed, analyze_with_options, CsvAnalysis, CsvInfo, Deadline, DetailedAnalysis,
    PipelineError,
};
pub use report::{assemble_report, sanitize_report, ReportContext};
