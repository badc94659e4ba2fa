//! REST API types.
//!
//! Success bodies wrap the analysis output with a job id and metadata.
//! Failures always use the same envelope:
//! `{jobId, status: "error", error: {code, message, suggestions}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::{CsvAnalysis, CsvInfo, DetailedAnalysis, PipelineError};
use crate::error::{AnalysisError, ErrorKind, ServerError};
use crate::models::{AnalysisOutput, ColumnType, DataQualityMetrics};

/// Response sent after a successful analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready", or "warning" when the output had to be repaired
    pub status: String,

    pub output: AnalysisOutput,

    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub column_count: usize,
    pub row_count: usize,
    pub chart_count: usize,
    pub industry_domain: String,
    pub quality: DataQualityMetrics,
    pub columns: Vec<ColumnSummary>,
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,

    /// Present for CSV uploads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_info: Option<CsvMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub name: String,
    pub inferred_type: ColumnType,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub sample_rows: usize,
    pub total_rows: usize,
}

impl From<CsvInfo> for CsvMetadata {
    fn from(info: CsvInfo) -> Self {
        Self {
            encoding: info.encoding,
            delimiter: info.delimiter.to_string(),
            sample_rows: info.sample_rows,
            total_rows: info.total_rows,
        }
    }
}

impl AnalyzeResponse {
    pub fn new(analysis: DetailedAnalysis, row_count: usize, csv_info: Option<CsvInfo>) -> Self {
        let status = if analysis.warnings.is_empty() { "ready" } else { "warning" };

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: ResponseMetadata {
                column_count: analysis.columns.len(),
                row_count,
                chart_count: analysis.output.charts_to_generate.len(),
                industry_domain: analysis.insights.industry_domain,
                quality: analysis.quality,
                columns: analysis
                    .columns
                    .into_iter()
                    .map(|c| ColumnSummary {
                        name: c.name,
                        inferred_type: c.inferred_type,
                    })
                    .collect(),
                warnings: analysis.warnings,
                elapsed_ms: analysis.elapsed_ms,
                csv_info: csv_info.map(CsvMetadata::from),
            },
            output: analysis.output,
        }
    }
}

impl From<CsvAnalysis> for AnalyzeResponse {
    fn from(result: CsvAnalysis) -> Self {
        let rows = result.csv_info.sample_rows;
        AnalyzeResponse::new(result.analysis, rows, Some(result.csv_info))
    }
}

/// Body of `/api/format`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResponse {
    pub job_id: String,
    pub status: String,
    pub output: AnalysisOutput,
    pub warnings: Vec<String>,
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP status for a classified analysis failure.
pub fn status_for(error: &AnalysisError) -> StatusCode {
    match error.kind() {
        ErrorKind::InputValidation | ErrorKind::DataQuality | ErrorKind::InsufficientData => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::OutputFormatting => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Create an error envelope
pub fn error_response(code: &str, message: &str, suggestions: &[String]) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": {
            "code": code,
            "message": message,
            "suggestions": suggestions,
        }
    })
}

/// Error envelope for a classified analysis failure.
pub fn analysis_error_response(error: &AnalysisError) -> Value {
    let mut body = error_response(error.code().as_str(), &error.to_string(), &error.suggestions());
    body["error"]["kind"] = json!(error.kind());
    if let AnalysisError::DataQuality { issues, .. } = error {
        body["error"]["issues"] = json!(issues);
    }
    body
}

impl From<PipelineError> for ServerError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Csv(e) => ServerError::BadRequest(e.to_string()),
            PipelineError::Analysis(e) => ServerError::Analysis(e),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::Analysis(e) => (status_for(e), analysis_error_response(e)),
            ServerError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                error_response(
                    "BAD_REQUEST",
                    msg,
                    &["Send a valid JSON body, or a multipart form with a CSV `file` field".to_string()],
                ),
            ),
            ServerError::Io(_) | ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_response("INTERNAL_ERROR", "The analysis could not be completed", &[]),
            ),
        };
        (status, Json(body)).into_response()
    }
}
