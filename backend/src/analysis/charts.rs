//! Chart recommendation generator.
//!
//! # Algorithm
//!
//! ```text
//! columns ──▶ buckets ──▶ candidates ──▶ dedup ──▶ diversity selection ──▶ ≤ cap charts
//!            (num/cat/   (bar, line,    (per-call   (cover every aspect
//!             date/text)  scatter)       cache)      first, then in order)
//! ```
//!
//! Columns are partitioned once; pairing walks at most
//! `max_columns_per_bucket` columns per bucket and each chart family stops
//! at the output cap, so work stays near-linear in the column count.
//!
//! [`generate_charts`] never fails: when no candidate survives, or the
//! column metadata is malformed, a single row-count bar chart is returned.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::api::logs::{log_stage, LogLevel};
use crate::cache::{ChartCache, Rejection, COUNT_AXIS};
use crate::config::{AnalysisOptions, Thresholds, MAX_CHARTS};
use crate::models::{ChartRecommendation, ChartType, ColumnInfo, ColumnType};

const STAGE: &str = "charts";

/// Grouping columns with at most this many values are treated as parts of
/// a whole.
const COMPOSITION_MAX_GROUPS: usize = 5;

/// Label used by the fallback chart when no column has a usable name.
const FALLBACK_AXIS: &str = "Records";

/// Analytical aspect a chart covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChartAspect {
    Distribution,
    Comparison,
    Correlation,
    Trend,
    Composition,
}

/// Order in which aspects are covered when the cap forces a choice.
pub const ASPECT_ORDER: [ChartAspect; 5] = [
    ChartAspect::Distribution,
    ChartAspect::Comparison,
    ChartAspect::Correlation,
    ChartAspect::Trend,
    ChartAspect::Composition,
];

impl fmt::Display for ChartAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Internal generation faults. They never escape [`generate_charts`].
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart candidate '{0}' has a blank field")]
    BlankField(String),
}

/// A chart awaiting selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chart: ChartRecommendation,
    pub aspect: ChartAspect,
}

// =============================================================================
// Buckets
// =============================================================================

/// Columns partitioned by role, each bucket capped.
#[derive(Debug, Default)]
pub struct ColumnBuckets<'a> {
    pub numerical: Vec<&'a ColumnInfo>,
    pub categorical: Vec<&'a ColumnInfo>,
    pub datetime: Vec<&'a ColumnInfo>,
    /// Text columns with few enough unique values to group by.
    pub chartable_text: Vec<&'a ColumnInfo>,
}

impl<'a> ColumnBuckets<'a> {
    pub fn partition(columns: &'a [ColumnInfo], thresholds: &Thresholds) -> Self {
        let ceiling = thresholds.max_columns_per_bucket;
        let mut buckets = Self::default();

        for column in columns {
            let bucket = match column.inferred_type {
                ColumnType::Numerical => &mut buckets.numerical,
                ColumnType::Categorical => &mut buckets.categorical,
                ColumnType::Datetime => &mut buckets.datetime,
                ColumnType::Text if column.unique_value_count <= thresholds.chartable_text_max_unique => {
                    &mut buckets.chartable_text
                }
                ColumnType::Text => continue,
            };
            if bucket.len() < ceiling {
                bucket.push(column);
            }
        }

        buckets
    }

    /// Columns usable on a bar chart's category axis.
    pub fn grouping(&self) -> impl Iterator<Item = &'a ColumnInfo> + '_ {
        self.categorical
            .iter()
            .chain(self.chartable_text.iter())
            .copied()
    }
}

// =============================================================================
// Generation context
// =============================================================================

/// Everything one generation call accumulates; dropped with the call.
struct GenerationContext {
    cache: ChartCache,
    candidates: Vec<Candidate>,
    per_family: BTreeMap<ChartType, usize>,
    family_cap: usize,
}

impl GenerationContext {
    fn new(family_cap: usize) -> Self {
        Self {
            cache: ChartCache::new(),
            candidates: Vec::new(),
            per_family: BTreeMap::new(),
            family_cap,
        }
    }

    fn family_full(&self, chart_type: ChartType) -> bool {
        self.per_family.get(&chart_type).copied().unwrap_or(0) >= self.family_cap
    }

    fn push(
        &mut self,
        chart_type: ChartType,
        title: String,
        x_axis: &str,
        y_axis: &str,
        aspect: ChartAspect,
    ) -> Result<(), ChartError> {
        let chart = ChartRecommendation {
            title,
            chart_type,
            x_axis: x_axis.to_string(),
            y_axis: y_axis.to_string(),
        };
        match self.cache.admit(&chart) {
            Ok(()) => {
                *self.per_family.entry(chart_type).or_insert(0) += 1;
                self.candidates.push(Candidate { chart, aspect });
                Ok(())
            }
            Err(Rejection::Incomplete) => Err(ChartError::BlankField(chart.title)),
            Err(Rejection::Duplicate | Rejection::SelfPair) => Ok(()),
        }
    }
}

// =============================================================================
// Candidate families
// =============================================================================

fn bar_candidates(ctx: &mut GenerationContext, buckets: &ColumnBuckets) -> Result<(), ChartError> {
    if buckets.numerical.is_empty() {
        for group in buckets.grouping() {
            if ctx.family_full(ChartType::Bar) {
                break;
            }
            ctx.push(
                ChartType::Bar,
                format!("Record count by {}", group.name),
                &group.name,
                COUNT_AXIS,
                ChartAspect::Distribution,
            )?;
        }
        return Ok(());
    }

    for group in buckets.grouping() {
        let aspect = if group.unique_value_count <= COMPOSITION_MAX_GROUPS {
            ChartAspect::Composition
        } else {
            ChartAspect::Comparison
        };
        for measure in &buckets.numerical {
            if ctx.family_full(ChartType::Bar) {
                return Ok(());
            }
            ctx.push(
                ChartType::Bar,
                format!("{} by {}", measure.name, group.name),
                &group.name,
                &measure.name,
                aspect,
            )?;
        }
    }
    Ok(())
}

fn line_candidates(ctx: &mut GenerationContext, buckets: &ColumnBuckets) -> Result<(), ChartError> {
    for time in &buckets.datetime {
        for measure in &buckets.numerical {
            if ctx.family_full(ChartType::Line) {
                return Ok(());
            }
            ctx.push(
                ChartType::Line,
                format!("{} trend over {}", measure.name, time.name),
                &time.name,
                &measure.name,
                ChartAspect::Trend,
            )?;
        }
    }
    Ok(())
}

/// Plain scatter per unordered pair of the first `limit` numerical columns,
/// plus a bubble variant (axes swapped, sized by a third column) when one
/// is available.
fn scatter_candidates(
    ctx: &mut GenerationContext,
    buckets: &ColumnBuckets,
    limit: usize,
) -> Result<(), ChartError> {
    let measures: Vec<&ColumnInfo> = buckets.numerical.iter().take(limit).copied().collect();

    for (i, a) in measures.iter().enumerate() {
        for b in measures.iter().skip(i + 1) {
            if ctx.family_full(ChartType::Scatter) {
                return Ok(());
            }
            ctx.push(
                ChartType::Scatter,
                format!("{} vs {}", a.name, b.name),
                &a.name,
                &b.name,
                ChartAspect::Correlation,
            )?;

            let third = measures
                .iter()
                .find(|c| c.name != a.name && c.name != b.name)
                .or_else(|| buckets.categorical.first());
            if let Some(size) = third {
                if ctx.family_full(ChartType::Scatter) {
                    return Ok(());
                }
                ctx.push(
                    ChartType::Scatter,
                    format!("{} vs {} sized by {}", b.name, a.name, size.name),
                    &b.name,
                    &a.name,
                    ChartAspect::Correlation,
                )?;
            }
        }
    }
    Ok(())
}

// =============================================================================
// Selection
// =============================================================================

/// Pick at most `cap` candidates: one per aspect first (in [`ASPECT_ORDER`]),
/// then the rest in generation order. Output keeps generation order.
pub fn select_diverse(candidates: Vec<Candidate>, cap: usize) -> Vec<Candidate> {
    if candidates.len() <= cap {
        return candidates;
    }

    let mut picked = BTreeSet::new();
    for aspect in ASPECT_ORDER {
        if picked.len() >= cap {
            break;
        }
        if let Some(index) = candidates.iter().position(|c| c.aspect == aspect) {
            picked.insert(index);
        }
    }
    for index in 0..candidates.len() {
        if picked.len() >= cap {
            break;
        }
        picked.insert(index);
    }

    candidates
        .into_iter()
        .enumerate()
        .filter(|(index, _)| picked.contains(index))
        .map(|(_, candidate)| candidate)
        .collect()
}

// =============================================================================
// Entry points
// =============================================================================

/// Generate, dedup and select candidates. Fails on malformed metadata.
pub fn try_generate_charts(
    columns: &[ColumnInfo],
    options: &AnalysisOptions,
) -> Result<Vec<Candidate>, ChartError> {
    let cap = options.max_charts.clamp(1, MAX_CHARTS);
    let buckets = ColumnBuckets::partition(columns, &options.thresholds);

    log_stage(
        LogLevel::Info,
        STAGE,
        format!(
            "Buckets: {} numerical, {} categorical, {} datetime, {} chartable text",
            buckets.numerical.len(),
            buckets.categorical.len(),
            buckets.datetime.len(),
            buckets.chartable_text.len()
        ),
    );

    let mut ctx = GenerationContext::new(cap);
    bar_candidates(&mut ctx, &buckets)?;
    line_candidates(&mut ctx, &buckets)?;
    scatter_candidates(&mut ctx, &buckets, options.thresholds.scatter_column_limit)?;

    log_stage(
        LogLevel::Info,
        STAGE,
        format!(
            "{} unique candidates, {} rejected",
            ctx.cache.admitted(),
            ctx.cache.rejected()
        ),
    );

    Ok(select_diverse(ctx.candidates, cap))
}

/// Minimal fallback: one row-count bar chart.
pub fn fallback_charts(columns: &[ColumnInfo]) -> Vec<ChartRecommendation> {
    let axis = columns
        .iter()
        .map(|c| c.name.trim())
        .find(|name| !name.is_empty())
        .unwrap_or(FALLBACK_AXIS);

    vec![ChartRecommendation {
        title: format!("Record count by {}", axis),
        chart_type: ChartType::Bar,
        x_axis: axis.to_string(),
        y_axis: COUNT_AXIS.to_string(),
    }]
}

/// Chart recommendations for the given columns. Never empty when columns
/// exist, never more than the cap.
pub fn generate_charts(columns: &[ColumnInfo], options: &AnalysisOptions) -> Vec<ChartRecommendation> {
    if columns.is_empty() {
        return Vec::new();
    }

    match try_generate_charts(columns, options) {
        Ok(selected) if !selected.is_empty() => {
            let aspects: BTreeSet<ChartAspect> = selected.iter().map(|c| c.aspect).collect();
            log_stage(
                LogLevel::Success,
                STAGE,
                format!(
                    "{} charts covering {}",
                    selected.len(),
                    aspects
                        .iter()
                        .map(|a| a.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
            selected.into_iter().map(|c| c.chart).collect()
        }
        Ok(_) => {
            log_stage(LogLevel::Warning, STAGE, "No eligible column pairs, using fallback chart");
            fallback_charts(columns)
        }
        Err(e) => {
            log_stage(LogLevel::Warning, STAGE, format!("{}, using fallback chart", e));
            fallback_charts(columns)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn column(name: &str, inferred_type: ColumnType, unique: usize) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            inferred_type,
            unique_value_count: unique,
            has_missing: false,
            sample_values: vec![],
        }
    }

    fn numerical(name: &str) -> ColumnInfo {
        column(name, ColumnType::Numerical, 10)
    }

    fn keys(charts: &[ChartRecommendation]) -> HashSet<(ChartType, String, String)> {
        charts.iter().map(|c| c.key()).collect()
    }

    #[test]
    fn test_product_price_sales() {
        let columns = vec![
            column("product", ColumnType::Text, 2),
            numerical("price"),
            numerical("sales"),
        ];
        let charts = generate_charts(&columns, &AnalysisOptions::default());

        let titles: Vec<&str> = charts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["price by product", "sales by product", "price vs sales"]);
        assert_eq!(charts[0].x_axis, "product");
        assert_eq!(charts[0].y_axis, "price");
        assert_eq!(charts[2].chart_type, ChartType::Scatter);
    }

    #[test]
    fn test_single_numeric_column_falls_back() {
        let charts = generate_charts(&[numerical("id")], &AnalysisOptions::default());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].chart_type, ChartType::Bar);
        assert_eq!(charts[0].x_axis, "id");
        assert_eq!(charts[0].y_axis, "Count");
    }

    #[test]
    fn test_no_columns_no_charts() {
        assert!(generate_charts(&[], &AnalysisOptions::default()).is_empty());
    }

    #[test]
    fn test_count_bars_without_numerical() {
        let columns = vec![
            column("region", ColumnType::Categorical, 3),
            column("notes", ColumnType::Text, 200),
        ];
        let charts = generate_charts(&columns, &AnalysisOptions::default());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].title, "Record count by region");
        assert_eq!(charts[0].y_axis, COUNT_AXIS);
    }

    #[test]
    fn test_line_charts_for_dates() {
        let columns = vec![column("date", ColumnType::Datetime, 10), numerical("revenue")];
        let charts = generate_charts(&columns, &AnalysisOptions::default());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].chart_type, ChartType::Line);
        assert_eq!(charts[0].x_axis, "date");
        assert_eq!(charts[0].y_axis, "revenue");
    }

    #[test]
    fn test_bubble_variant_uses_categorical_third() {
        let columns = vec![
            numerical("price"),
            numerical("sales"),
            column("segment", ColumnType::Categorical, 3),
        ];
        let candidates = try_generate_charts(&columns, &AnalysisOptions::default()).unwrap();
        let scatters: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.chart.chart_type == ChartType::Scatter)
            .collect();
        assert_eq!(scatters.len(), 2);
        assert_eq!(scatters[1].chart.title, "sales vs price sized by segment");
        assert_eq!(scatters[1].chart.x_axis, "sales");
    }

    #[test]
    fn test_scatter_limited_to_first_five_numerical() {
        let columns: Vec<ColumnInfo> = (0..150).map(|i| numerical(&format!("m{}", i))).collect();
        let charts = generate_charts(&columns, &AnalysisOptions::default());

        assert!(charts.len() <= MAX_CHARTS);
        // 10 pairs, each with a bubble variant
        assert_eq!(charts.len(), 20);
        let allowed: HashSet<String> = (0..5).map(|i| format!("m{}", i)).collect();
        for chart in &charts {
            assert_eq!(chart.chart_type, ChartType::Scatter);
            assert!(allowed.contains(&chart.x_axis));
            assert!(allowed.contains(&chart.y_axis));
        }
    }

    #[test]
    fn test_cap_and_uniqueness_with_many_pairs() {
        let mut columns: Vec<ColumnInfo> = (0..30)
            .map(|i| column(&format!("cat{}", i), ColumnType::Categorical, 8))
            .collect();
        columns.extend((0..30).map(|i| numerical(&format!("num{}", i))));
        columns.push(column("day", ColumnType::Datetime, 30));

        let charts = generate_charts(&columns, &AnalysisOptions::default());
        assert_eq!(charts.len(), MAX_CHARTS);
        assert_eq!(keys(&charts).len(), charts.len());

        let types: HashSet<ChartType> = charts.iter().map(|c| c.chart_type).collect();
        assert!(types.contains(&ChartType::Bar));
        assert!(types.contains(&ChartType::Line));
        assert!(types.contains(&ChartType::Scatter));
    }

    #[test]
    fn test_select_diverse_covers_aspects_first() {
        let make = |i: usize, aspect| Candidate {
            chart: ChartRecommendation {
                title: format!("c{}", i),
                chart_type: ChartType::Bar,
                x_axis: format!("x{}", i),
                y_axis: "y".into(),
            },
            aspect,
        };
        let mut candidates: Vec<Candidate> =
            (0..5).map(|i| make(i, ChartAspect::Comparison)).collect();
        candidates.push(make(5, ChartAspect::Trend));
        candidates.push(make(6, ChartAspect::Correlation));

        let selected = select_diverse(candidates, 3);
        let titles: Vec<&str> = selected.iter().map(|c| c.chart.title.as_str()).collect();
        assert_eq!(titles, vec!["c0", "c5", "c6"]);
    }

    #[test]
    fn test_blank_names_trigger_fallback() {
        let columns = vec![
            column("region", ColumnType::Categorical, 3),
            numerical(" "),
            numerical("sales"),
        ];
        let charts = generate_charts(&columns, &AnalysisOptions::default());
        assert_eq!(charts, fallback_charts(&columns));
        assert_eq!(charts[0].x_axis, "region");
    }

    #[test]
    fn test_high_cardinality_text_not_grouped() {
        let columns = vec![column("comment", ColumnType::Text, 21), numerical("score")];
        let buckets = ColumnBuckets::partition(&columns, &Thresholds::default());
        assert!(buckets.chartable_text.is_empty());
        assert_eq!(buckets.grouping().count(), 0);
    }

    #[test]
    fn test_bucket_ceiling() {
        let columns: Vec<ColumnInfo> = (0..40).map(|i| numerical(&format!("n{}", i))).collect();
        let buckets = ColumnBuckets::partition(&columns, &Thresholds::default());
        assert_eq!(buckets.numerical.len(), 25);
    }

    #[test]
    fn test_cap_option_is_clamped() {
        let columns = vec![
            column("region", ColumnType::Categorical, 3),
            numerical("sales"),
            numerical("cost"),
        ];
        let options = AnalysisOptions {
            max_charts: 0,
            ..AnalysisOptions::default()
        };
        assert_eq!(generate_charts(&columns, &options).len(), 1);
    }
}
