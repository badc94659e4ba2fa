//! Markdown report assembly.
//!
//! The report is built from a fixed table of sections. Each section has a
//! generator and a fallback text; a failing generator is replaced by its
//! fallback and the remaining sections still run. When every generator
//! fails the whole report is replaced by [`FALLBACK_REPORT`].

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::analysis::pipeline::Deadline;
use crate::api::logs::{log_stage, LogLevel};
use crate::config::AnalysisOptions;
use crate::error::{AnalysisResult, ErrorCode};
use crate::models::{BusinessInsights, ColumnInfo, ColumnType, DataQualityMetrics};

const STAGE: &str = "report";

/// Appended to a report cut at the character cap.
pub const TRUNCATION_NOTICE: &str = "\n\n*[Report truncated]*";

pub const FALLBACK_REPORT: &str = "# Executive Summary

An automated overview of this dataset could not be generated in full.

## Statistical Analysis

Column statistics are unavailable for this sample.

## Relationship Insights

No relationships could be derived from the sample.

## Actionable Business Questions

1. Which measures matter most for the business?
2. How do key values change over time?
3. Which groups of records perform best and worst?
4. What additional data would make this analysis more useful?

## Conclusion

Review the data for completeness and consistency, then run the analysis again.";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no columns to describe")]
    NoColumns,
    #[error("section '{0}' has no content")]
    EmptySection(&'static str),
}

/// Everything a section generator may read.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub columns: &'a [ColumnInfo],
    pub quality: &'a DataQualityMetrics,
    pub insights: &'a BusinessInsights,
}

pub type SectionFn = fn(&ReportContext) -> Result<String, ReportError>;

pub struct ReportSection {
    pub id: &'static str,
    pub generate: SectionFn,
    pub fallback: &'static str,
}

pub const REPORT_SECTIONS: [ReportSection; 5] = [
    ReportSection {
        id: "executive-summary",
        generate: executive_summary,
        fallback: "# Executive Summary\n\nA summary of this dataset is unavailable.",
    },
    ReportSection {
        id: "statistical-analysis",
        generate: statistical_analysis,
        fallback: "## Statistical Analysis\n\nColumn statistics are unavailable for this sample.",
    },
    ReportSection {
        id: "relationship-insights",
        generate: relationship_insights,
        fallback: "## Relationship Insights\n\nNo relationships could be derived from the sample.",
    },
    ReportSection {
        id: "business-questions",
        generate: business_questions,
        fallback: "## Actionable Business Questions\n\n1. Which measures matter most for the business?\n2. How do key values change over time?\n3. Which groups of records perform best and worst?\n4. What additional data would make this analysis more useful?",
    },
    ReportSection {
        id: "conclusion",
        generate: conclusion,
        fallback: "## Conclusion\n\nCollect a larger sample to refine these findings.",
    },
];

// =============================================================================
// Sections
// =============================================================================

fn pct(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// Escape characters that would break a markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn type_breakdown(columns: &[ColumnInfo]) -> String {
    [
        ColumnType::Numerical,
        ColumnType::Categorical,
        ColumnType::Datetime,
        ColumnType::Text,
    ]
    .iter()
    .filter_map(|t| {
        let n = columns.iter().filter(|c| c.is(*t)).count();
        (n > 0).then(|| format!("{} {}", n, t))
    })
    .collect::<Vec<_>>()
    .join(", ")
}

fn executive_summary(ctx: &ReportContext) -> Result<String, ReportError> {
    if ctx.columns.is_empty() {
        return Err(ReportError::NoColumns);
    }

    let mut out = format!(
        "# Executive Summary\n\nThis {} dataset has {} columns ({}). Overall data quality is {} ({} complete, {} consistent).",
        ctx.insights.industry_domain,
        ctx.columns.len(),
        type_breakdown(ctx.columns),
        pct(ctx.quality.overall()),
        pct(ctx.quality.completeness),
        pct(ctx.quality.consistency),
    );

    if !ctx.insights.primary_value_columns.is_empty() {
        let names: Vec<String> = ctx
            .insights
            .primary_value_columns
            .iter()
            .map(|n| format!("**{}**", n))
            .collect();
        out.push_str(&format!("\n\nKey value columns: {}.", names.join(", ")));
    }

    if !ctx.insights.dataset_potential.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(&ctx.insights.dataset_potential);
    }
    Ok(out)
}

fn statistical_analysis(ctx: &ReportContext) -> Result<String, ReportError> {
    if ctx.columns.is_empty() {
        return Err(ReportError::NoColumns);
    }

    let mut out = String::from(
        "## Statistical Analysis\n\n| Column | Type | Unique values | Missing |\n|---|---|---|---|",
    );
    for column in ctx.columns {
        out.push_str(&format!(
            "\n| {} | {} | {} | {} |",
            cell(&column.name),
            column.inferred_type,
            column.unique_value_count,
            if column.has_missing { "yes" } else { "no" }
        ));
    }

    out.push_str("\n\n### Data Quality\n\n");
    if ctx.quality.issues.is_empty() {
        out.push_str("No data-quality issues were detected.");
    } else {
        let issues: Vec<String> = ctx.quality.issues.iter().map(|i| format!("- {}", i)).collect();
        out.push_str(&issues.join("\n"));
    }
    Ok(out)
}

fn relationship_insights(ctx: &ReportContext) -> Result<String, ReportError> {
    let correlations = &ctx.insights.potential_correlations;
    if correlations.is_empty() {
        return Err(ReportError::EmptySection("relationship-insights"));
    }

    let bullets: Vec<String> = correlations.iter().map(|c| format!("- {}", c)).collect();
    Ok(format!(
        "## Relationship Insights\n\n{}\n\nThese are candidate relationships suggested by column names and types, not computed correlations.",
        bullets.join("\n")
    ))
}

fn business_questions(ctx: &ReportContext) -> Result<String, ReportError> {
    let questions = &ctx.insights.actionable_questions;
    if questions.is_empty() {
        return Err(ReportError::EmptySection("business-questions"));
    }

    let numbered: Vec<String> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect();
    Ok(format!("## Actionable Business Questions\n\n{}", numbered.join("\n")))
}

fn conclusion(ctx: &ReportContext) -> Result<String, ReportError> {
    if ctx.columns.is_empty() {
        return Err(ReportError::NoColumns);
    }

    let focus = match ctx.insights.primary_value_columns.first() {
        Some(metric) => format!("Start with {} as the main performance measure", metric),
        None => "Start by identifying a measurable outcome to track".to_string(),
    };
    let quality_note = if ctx.quality.issues.is_empty() {
        "The sample is clean enough to move straight to exploration."
    } else {
        "Resolve the data-quality issues above before drawing conclusions."
    };

    Ok(format!(
        "## Conclusion\n\n{} and validate the candidate relationships on the full {} dataset. {}",
        focus, ctx.insights.industry_domain, quality_note
    ))
}

// =============================================================================
// Assembly
// =============================================================================

/// Run a section table. `check` is called before every section and aborts
/// assembly when it fails.
pub fn compose_sections(
    sections: &[ReportSection],
    ctx: &ReportContext,
    mut check: impl FnMut() -> AnalysisResult<()>,
) -> AnalysisResult<String> {
    let mut parts = Vec::with_capacity(sections.len());
    let mut failed = 0;

    for section in sections {
        check()?;
        let text = match (section.generate)(ctx) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                failed += 1;
                log_stage(LogLevel::Warning, STAGE, format!("{}: empty, using fallback", section.id));
                section.fallback.to_string()
            }
            Err(e) => {
                failed += 1;
                log_stage(LogLevel::Warning, STAGE, format!("{}: {}, using fallback", section.id, e));
                section.fallback.to_string()
            }
        };
        if !text.trim().is_empty() {
            parts.push(text);
        }
    }

    let combined = parts.join("\n\n");
    if failed == sections.len() || combined.trim().is_empty() {
        log_stage(LogLevel::Warning, STAGE, "All sections failed, using canned report");
        return Ok(FALLBACK_REPORT.to_string());
    }
    Ok(combined)
}

/// Normalize a report for the output contract: LF line endings, no control
/// characters or U+2028/U+2029, NFC, trimmed, at most `max_chars` characters
/// including the truncation notice.
pub fn sanitize_report(text: &str, max_chars: usize) -> String {
    truncate_chars(&normalize_report(text), max_chars)
}

/// Unified line endings, no control or separator characters, NFC, trimmed.
pub fn normalize_report(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = unified
        .chars()
        .filter(|c| {
            !((c.is_control() && *c != '\n' && *c != '\t') || *c == '\u{2028}' || *c == '\u{2029}')
        })
        .collect();
    let normalized: String = cleaned.nfc().collect();
    normalized.trim().to_string()
}

/// Cut to `max_chars` characters, appending the notice when anything is cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let notice_len = TRUNCATION_NOTICE.chars().count();
    if max_chars <= notice_len {
        return text.chars().take(max_chars).collect();
    }

    let kept: String = text.chars().take(max_chars - notice_len).collect();
    let mut out = kept.trim_end().to_string();
    out.push_str(TRUNCATION_NOTICE);
    out
}

/// Build the final report under its own budget and the overall deadline.
pub fn assemble_report(
    ctx: &ReportContext,
    options: &AnalysisOptions,
    overall: &Deadline,
) -> AnalysisResult<String> {
    let budget = Deadline::start("Report generation", options.report_timeout(), ErrorCode::ReportTimeout);

    let raw = compose_sections(&REPORT_SECTIONS, ctx, || {
        overall.check()?;
        budget.check()
    })?;

    let mut report = sanitize_report(&raw, options.max_report_chars);
    if report.is_empty() {
        report = sanitize_report(FALLBACK_REPORT, options.max_report_chars);
    }

    log_stage(
        LogLevel::Success,
        STAGE,
        format!("Report assembled ({} chars)", report.chars().count()),
    );
    Ok(report)
}
