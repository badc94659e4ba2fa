//! Analysis configuration.
//!
//! Budgets and every tunable heuristic constant live here. The thresholds
//! keep their historical defaults; they are tuning knobs rather than
//! load-bearing design decisions.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::api::logs::log_warning;

/// Overall wall-clock budget for one analysis.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Budget for report assembly.
pub const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 15;

/// Maximum number of chart recommendations in one output.
pub const MAX_CHARTS: usize = 100;

/// Maximum report length in characters.
pub const MAX_REPORT_CHARS: usize = 50_000;

/// Heuristic thresholds used by type inference and chart generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Share of non-missing values that must parse as numbers.
    pub numerical_ratio: f64,
    /// Share of non-missing values that must look like dates.
    pub datetime_ratio: f64,
    /// Upper bound of unique/non-missing ratio for categorical columns.
    pub categorical_unique_ratio: f64,
    /// Upper bound of average string length for categorical columns.
    pub categorical_max_avg_len: f64,
    /// Minimum non-missing values for a categorical column.
    pub categorical_min_samples: usize,
    /// Text columns with at most this many unique values are chartable.
    pub chartable_text_max_unique: usize,
    /// Only the first N numerical columns take part in scatter pairs.
    pub scatter_column_limit: usize,
    /// Columns considered per bucket when pairing.
    pub max_columns_per_bucket: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            numerical_ratio: 0.8,
            datetime_ratio: 0.7,
            categorical_unique_ratio: 0.7,
            categorical_max_avg_len: 10.0,
            categorical_min_samples: 2,
            chartable_text_max_unique: 20,
            scatter_column_limit: 5,
            max_columns_per_bucket: 25,
        }
    }
}

/// Options for one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Overall budget in milliseconds.
    pub timeout_ms: u64,
    /// Report assembly budget in milliseconds.
    pub report_timeout_ms: u64,
    pub max_charts: usize,
    pub max_report_chars: usize,
    pub thresholds: Thresholds,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_SECS * 1000,
            report_timeout_ms: DEFAULT_REPORT_TIMEOUT_SECS * 1000,
            max_charts: MAX_CHARTS,
            max_report_chars: MAX_REPORT_CHARS,
            thresholds: Thresholds::default(),
        }
    }
}

impl AnalysisOptions {
    /// Defaults overridden by `DATALENS_TIMEOUT_SECS` and
    /// `DATALENS_REPORT_TIMEOUT_SECS` (a `.env` file is loaded first).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut options = Self::default();
        if let Some(ms) = read_budget_ms("DATALENS_TIMEOUT_SECS") {
            options.timeout_ms = ms;
        }
        if let Some(ms) = read_budget_ms("DATALENS_REPORT_TIMEOUT_SECS") {
            options.report_timeout_ms = ms;
        }
        options
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }
}

fn read_budget_ms(var: &str) -> Option<u64> {
    let raw = env::var(var).ok()?;
    let ms = parse_budget_ms(&raw);
    if ms.is_none() {
        log_warning(format!("Ignoring invalid {}={:?}", var, raw));
    }
    ms
}

/// Seconds to milliseconds. Zero, garbage and overflowing values are rejected.
fn parse_budget_ms(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .and_then(|secs| secs.checked_mul(1000))
}
