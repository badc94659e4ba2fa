//! Error types for the Datalens analysis pipeline.
//!
//! This module defines the error hierarchy surfaced to callers:
//!
//! - [`AnalysisError`] - Classified, user-facing pipeline failures
//! - [`CsvError`] - CSV ingestion errors (collaborator side)
//! - [`ServerError`] - HTTP shim errors
//!
//! Every [`AnalysisError`] carries a stable [`ErrorCode`], a short message
//! and remediation suggestions. None of them is retryable: input and
//! quality errors must be fixed upstream, timeouts are fatal.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Codes
// =============================================================================

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    MissingHeaders,
    EmptyHeaders,
    InvalidHeader,
    BlankHeader,
    DuplicateHeader,
    MissingSampleData,
    RowNotArray,
    RowLengthMismatch,
    InsufficientRows,
    LowCompleteness,
    LowConsistency,
    TooManyIssues,
    AnalysisTimeout,
    ReportTimeout,
    InvalidOutput,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingHeaders => "MISSING_HEADERS",
            Self::EmptyHeaders => "EMPTY_HEADERS",
            Self::InvalidHeader => "INVALID_HEADER",
            Self::BlankHeader => "BLANK_HEADER",
            Self::DuplicateHeader => "DUPLICATE_HEADER",
            Self::MissingSampleData => "MISSING_SAMPLE_DATA",
            Self::RowNotArray => "ROW_NOT_ARRAY",
            Self::RowLengthMismatch => "ROW_LENGTH_MISMATCH",
            Self::InsufficientRows => "INSUFFICIENT_ROWS",
            Self::LowCompleteness => "LOW_COMPLETENESS",
            Self::LowConsistency => "LOW_CONSISTENCY",
            Self::TooManyIssues => "TOO_MANY_ISSUES",
            Self::AnalysisTimeout => "ANALYSIS_TIMEOUT",
            Self::ReportTimeout => "REPORT_TIMEOUT",
            Self::InvalidOutput => "INVALID_OUTPUT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad error class, used by the HTTP shim to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputValidation,
    DataQuality,
    InsufficientData,
    Timeout,
    OutputFormatting,
}

// =============================================================================
// Analysis Errors (top-level)
// =============================================================================

/// Classified failure of an analysis call.
///
/// This is the error type returned by [`crate::analyze`] and the strict
/// formatting entry point.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Malformed input shape or types.
    #[error("{message}")]
    InputValidation {
        code: ErrorCode,
        message: String,
        suggestions: Vec<String>,
    },

    /// The sample is too sparse or inconsistent to analyze.
    #[error("{message}")]
    DataQuality {
        code: ErrorCode,
        message: String,
        issues: Vec<String>,
        suggestions: Vec<String>,
    },

    /// Too few rows or columns.
    #[error("{message}")]
    InsufficientData {
        code: ErrorCode,
        message: String,
        suggestions: Vec<String>,
    },

    /// A phase or the whole pipeline exceeded its budget.
    #[error("{phase} exceeded its {budget_ms} ms budget")]
    Timeout {
        code: ErrorCode,
        phase: String,
        budget_ms: u64,
    },

    /// Strict-mode output contract violation.
    #[error("Output contract violated: {}", violations.join("; "))]
    OutputFormatting {
        code: ErrorCode,
        violations: Vec<String>,
    },
}

impl AnalysisError {
    pub fn input(code: ErrorCode, message: impl Into<String>, suggestions: &[&str]) -> Self {
        Self::InputValidation {
            code,
            message: message.into(),
            suggestions: to_owned(suggestions),
        }
    }

    pub fn quality(
        code: ErrorCode,
        message: impl Into<String>,
        issues: Vec<String>,
        suggestions: &[&str],
    ) -> Self {
        Self::DataQuality {
            code,
            message: message.into(),
            issues,
            suggestions: to_owned(suggestions),
        }
    }

    pub fn insufficient(code: ErrorCode, message: impl Into<String>, suggestions: &[&str]) -> Self {
        Self::InsufficientData {
            code,
            message: message.into(),
            suggestions: to_owned(suggestions),
        }
    }

    pub fn timeout(code: ErrorCode, phase: impl Into<String>, budget_ms: u64) -> Self {
        Self::Timeout {
            code,
            phase: phase.into(),
            budget_ms,
        }
    }

    pub fn formatting(violations: Vec<String>) -> Self {
        Self::OutputFormatting {
            code: ErrorCode::InvalidOutput,
            violations,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InputValidation { code, .. }
            | Self::DataQuality { code, .. }
            | Self::InsufficientData { code, .. }
            | Self::Timeout { code, .. }
            | Self::OutputFormatting { code, .. } => *code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation { .. } => ErrorKind::InputValidation,
            Self::DataQuality { .. } => ErrorKind::DataQuality,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::OutputFormatting { .. } => ErrorKind::OutputFormatting,
        }
    }

    /// Remediation hints for the caller.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InputValidation { suggestions, .. }
            | Self::DataQuality { suggestions, .. }
            | Self::InsufficientData { suggestions, .. } => suggestions.clone(),
            Self::Timeout { .. } => vec![
                "Reduce the number of sample rows or columns".to_string(),
                "Raise DATALENS_TIMEOUT_SECS if the sample is legitimately large".to_string(),
            ],
            Self::OutputFormatting { .. } => vec![
                "Use robust formatting mode to repair the output".to_string(),
            ],
        }
    }

    /// Classified errors are never retried locally.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while turning a CSV file into the input contract.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed CSV.
    #[error("Invalid CSV format: {0}")]
    ParseError(#[from] csv::Error),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Analysis failure surfaced through the API.
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Blocking task failed.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
