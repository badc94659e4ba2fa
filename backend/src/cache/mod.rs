//! Per-call chart dedup cache.
//!
//! Candidate charts are registered here while the generator runs. The cache
//! is owned by a single generation call and dropped with it, so sequential
//! or concurrent analyses never observe each other's keys.

use std::collections::HashSet;

use crate::models::{ChartKey, ChartRecommendation};

/// Why a candidate was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Same (type, xAxis, yAxis) already admitted.
    Duplicate,
    /// xAxis equals yAxis and yAxis is not the literal "Count".
    SelfPair,
    /// A field is blank.
    Incomplete,
}

/// Literal y-axis label of count-based charts.
pub const COUNT_AXIS: &str = "Count";

/// Dedup state for one generation call.
#[derive(Debug, Default)]
pub struct ChartCache {
    seen: HashSet<ChartKey>,
    rejected: usize,
}

impl ChartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate, returning why it was rejected if it was.
    pub fn admit(&mut self, chart: &ChartRecommendation) -> Result<(), Rejection> {
        let verdict = if !chart.is_complete() {
            Err(Rejection::Incomplete)
        } else if chart.x_axis == chart.y_axis && chart.y_axis != COUNT_AXIS {
            Err(Rejection::SelfPair)
        } else if !self.seen.insert(chart.key()) {
            Err(Rejection::Duplicate)
        } else {
            Ok(())
        };

        if verdict.is_err() {
            self.rejected += 1;
        }
        verdict
    }

    pub fn contains(&self, key: &ChartKey) -> bool {
        self.seen.contains(key)
    }

    pub fn admitted(&self) -> usize {
        self.seen.len()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChartType;

    fn chart(chart_type: ChartType, x: &str, y: &str) -> ChartRecommendation {
        ChartRecommendation {
            title: format!("{} / {}", x, y),
            chart_type,
            x_axis: x.into(),
            y_axis: y.into(),
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut cache = ChartCache::new();
        assert!(cache.admit(&chart(ChartType::Bar, "region", "sales")).is_ok());
        assert_eq!(
            cache.admit(&chart(ChartType::Bar, "region", "sales")),
            Err(Rejection::Duplicate)
        );
        // same axes, different type is a different chart
        assert!(cache.admit(&chart(ChartType::Line, "region", "sales")).is_ok());
        assert_eq!(cache.admitted(), 2);
        assert_eq!(cache.rejected(), 1);
    }

    #[test]
    fn test_self_pair_only_allowed_for_count() {
        let mut cache = ChartCache::new();
        assert_eq!(
            cache.admit(&chart(ChartType::Scatter, "price", "price")),
            Err(Rejection::SelfPair)
        );
        assert!(cache.admit(&chart(ChartType::Bar, COUNT_AXIS, COUNT_AXIS)).is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut cache = ChartCache::new();
        assert_eq!(
            cache.admit(&chart(ChartType::Bar, " ", "sales")),
            Err(Rejection::Incomplete)
        );
        assert!(!cache.contains(&(ChartType::Bar, " ".into(), "sales".into())));
    }

    #[test]
    fn test_fresh_cache_per_call() {
        let mut first = ChartCache::new();
        first.admit(&chart(ChartType::Bar, "a", "b")).unwrap();
        let mut second = ChartCache::new();
        assert!(second.admit(&chart(ChartType::Bar, "a", "b")).is_ok());
    }
}
