//! Heuristic business-intelligence extraction.
//!
//! No statistics are computed here: every finding comes from column names,
//! inferred types and sample values. Each field of [`BusinessInsights`] is
//! produced independently and degrades to a generic default on failure, so
//! insight generation as a whole never aborts.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::api::logs::{log_stage, LogLevel};
use crate::models::{BusinessInsights, ColumnInfo, ColumnType, DataQualityMetrics};

const STAGE: &str = "insights";

pub const DEFAULT_DOMAIN: &str = "General Business";

/// Maximum number of primary value columns.
pub const MAX_PRIMARY_COLUMNS: usize = 3;

/// Number of actionable questions, always.
pub const QUESTION_COUNT: usize = 4;

const MAX_CORRELATIONS: usize = 6;
const MAX_CORRELATION_PARTNERS: usize = 10;
const MAX_SEGMENT_COLUMNS: usize = 2;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("no columns to inspect")]
    NoColumns,
    #[error("no numerical columns")]
    NoNumericalColumns,
    #[error("no primary value columns to relate")]
    NoPrimaryColumns,
    #[error("expected {QUESTION_COUNT} questions, built {0}")]
    QuestionCount(usize),
    #[error("quality scores are not finite")]
    InvalidQuality,
}

// =============================================================================
// Rule tables
// =============================================================================

/// Keyword set → domain label. Evaluated in order, first match wins.
pub struct DomainRule {
    pub domain: &'static str,
    pub keywords: &'static [&'static str],
    /// Domain-specific actionable question.
    pub question: &'static str,
}

pub const DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        domain: "Healthcare",
        keywords: &["patient", "diagnosis", "hospital", "treatment", "medication", "clinical", "doctor", "symptom"],
        question: "Which treatments or care pathways are associated with the best patient outcomes?",
    },
    DomainRule {
        domain: "Finance & Banking",
        keywords: &["transaction", "account", "balance", "loan", "credit", "interest", "portfolio", "investment", "ticker"],
        question: "Which accounts or instruments carry the most risk relative to their return?",
    },
    DomainRule {
        domain: "E-commerce & Retail",
        keywords: &["product", "order", "sku", "cart", "inventory", "discount", "customer", "price", "store"],
        question: "Which products or customer groups should be prioritized to grow basket value?",
    },
    DomainRule {
        domain: "Marketing & Advertising",
        keywords: &["campaign", "click", "impression", "conversion", "ctr", "lead", "channel", "audience"],
        question: "Which campaigns or channels deliver the best return on marketing spend?",
    },
    DomainRule {
        domain: "Human Resources",
        keywords: &["employee", "salary", "department", "hire", "payroll", "tenure", "headcount"],
        question: "Which teams show the highest attrition risk, and what distinguishes them?",
    },
    DomainRule {
        domain: "Education",
        keywords: &["student", "grade", "course", "school", "exam", "instructor", "enrollment"],
        question: "Which courses or cohorts need additional support to improve results?",
    },
    DomainRule {
        domain: "Logistics & Supply Chain",
        keywords: &["shipment", "warehouse", "delivery", "supplier", "freight", "carrier", "route"],
        question: "Where are the bottlenecks that delay deliveries or inflate shipping costs?",
    },
    DomainRule {
        domain: "Real Estate",
        keywords: &["property", "rent", "bedroom", "sqft", "mortgage", "listing", "tenant"],
        question: "Which property features command the highest price premium?",
    },
    DomainRule {
        domain: "Technology & SaaS",
        keywords: &["user", "session", "subscription", "churn", "server", "latency", "pageview", "signup"],
        question: "Which usage patterns predict retention or churn?",
    },
    DomainRule {
        domain: "Sales & Revenue",
        keywords: &["revenue", "sales", "profit", "deal", "quota", "pipeline"],
        question: "Which segments generate the most profitable revenue?",
    },
];

const GENERAL_QUESTION: &str =
    "What decisions could this dataset inform if it were collected at a larger scale?";

/// Name tokens that mark a column as a business value, with weights.
const VALUE_TOKENS: &[(&str, i32)] = &[
    ("revenue", 5),
    ("sales", 5),
    ("profit", 5),
    ("income", 4),
    ("price", 4),
    ("amount", 4),
    ("cost", 3),
    ("spend", 3),
    ("total", 3),
    ("value", 3),
    ("margin", 3),
    ("salary", 3),
    ("balance", 3),
    ("quantity", 2),
    ("units", 2),
    ("score", 1),
    ("count", 1),
];

/// Name tokens marking identifiers rather than measures.
const IDENTIFIER_TOKENS: &[&str] = &["id", "key", "code", "uuid", "index", "zip", "sku"];

/// (left tokens, right tokens, relationship description).
const CORRELATION_RULES: &[(&[&str], &[&str], &str)] = &[
    (&["price"], &["sales", "quantity", "units", "demand", "orders"], "pricing may influence demand"),
    (&["cost", "spend", "budget"], &["revenue", "sales", "profit", "conversion", "conversions"], "spend may drive returns"),
    (&["discount"], &["sales", "quantity", "revenue", "units"], "discounting may lift volume"),
    (&["click", "clicks", "impression", "impressions"], &["conversion", "conversions", "sales", "revenue"], "engagement may convert into results"),
    (&["salary"], &["tenure", "experience", "rating", "performance"], "compensation may track experience"),
    (&["revenue", "sales"], &["profit", "margin"], "volume may drive profitability"),
];

// =============================================================================
// Tokens
// =============================================================================

/// Lowercase word tokens, splitting on punctuation and camelCase.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Token equals the keyword or a simple plural of it.
fn token_matches(token: &str, keyword: &str) -> bool {
    token == keyword
        || token
            .strip_prefix(keyword)
            .is_some_and(|rest| rest == "s" || rest == "es")
}

fn has_token(tokens: &[String], keywords: &[&str]) -> bool {
    tokens
        .iter()
        .any(|t| keywords.iter().any(|k| token_matches(t, k)))
}

fn column_tokens(column: &ColumnInfo) -> Vec<String> {
    tokenize(&column.name)
}

fn sample_tokens(column: &ColumnInfo) -> Vec<String> {
    column
        .sample_values
        .iter()
        .filter_map(|v| v.as_str())
        .flat_map(tokenize)
        .collect()
}

// =============================================================================
// Fields
// =============================================================================

/// First domain rule whose keywords appear in a column name or sample value.
pub fn detect_domain(columns: &[ColumnInfo]) -> Result<String, InsightError> {
    if columns.is_empty() {
        return Err(InsightError::NoColumns);
    }

    let mut tokens: Vec<String> = columns.iter().flat_map(column_tokens).collect();
    tokens.extend(columns.iter().flat_map(sample_tokens));

    Ok(DOMAIN_RULES
        .iter()
        .find(|rule| has_token(&tokens, rule.keywords))
        .map(|rule| rule.domain)
        .unwrap_or(DEFAULT_DOMAIN)
        .to_string())
}

fn value_weight(column: &ColumnInfo) -> i32 {
    let tokens = column_tokens(column);
    if has_token(&tokens, IDENTIFIER_TOKENS) {
        return -1;
    }
    VALUE_TOKENS
        .iter()
        .filter(|(keyword, _)| tokens.iter().any(|t| token_matches(t, keyword)))
        .map(|(_, weight)| *weight)
        .max()
        .unwrap_or(0)
}

/// Up to three numerical columns ranked by name weight, then unique count.
pub fn rank_value_columns(columns: &[ColumnInfo]) -> Result<Vec<String>, InsightError> {
    let mut ranked: Vec<(usize, i32, &ColumnInfo)> = columns
        .iter()
        .filter(|c| c.is(ColumnType::Numerical))
        .enumerate()
        .map(|(i, c)| (i, value_weight(c), c))
        .collect();

    if ranked.is_empty() {
        return Err(InsightError::NoNumericalColumns);
    }

    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(b.2.unique_value_count.cmp(&a.2.unique_value_count))
            .then(a.0.cmp(&b.0))
    });

    Ok(ranked
        .into_iter()
        .take(MAX_PRIMARY_COLUMNS)
        .map(|(_, _, c)| c.name.clone())
        .collect())
}

fn describe_pair(a: &str, b: &str) -> String {
    let ta = tokenize(a);
    let tb = tokenize(b);
    for (left, right, description) in CORRELATION_RULES {
        if (has_token(&ta, left) && has_token(&tb, right))
            || (has_token(&tb, left) && has_token(&ta, right))
        {
            return format!("{} and {}: {}", a, b, description);
        }
    }
    format!("{} and {} may move together", a, b)
}

/// Descriptive relationship candidates around the primary value columns.
pub fn find_correlations(
    columns: &[ColumnInfo],
    primary: &[String],
) -> Result<Vec<String>, InsightError> {
    if primary.is_empty() {
        return Err(InsightError::NoPrimaryColumns);
    }

    let numerical: Vec<&ColumnInfo> = columns
        .iter()
        .filter(|c| c.is(ColumnType::Numerical))
        .take(MAX_CORRELATION_PARTNERS)
        .collect();
    let segments: Vec<&ColumnInfo> = columns
        .iter()
        .filter(|c| c.is(ColumnType::Categorical))
        .take(MAX_SEGMENT_COLUMNS)
        .collect();

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();

    for p in primary {
        for q in &numerical {
            if &q.name == p {
                continue;
            }
            let pair = if p < &q.name {
                (p.clone(), q.name.clone())
            } else {
                (q.name.clone(), p.clone())
            };
            if seen.insert(pair) {
                found.push(describe_pair(p, &q.name));
            }
        }
        for segment in &segments {
            found.push(format!("{} may differ across {} segments", p, segment.name));
        }
    }

    found.truncate(MAX_CORRELATIONS);
    Ok(found)
}

/// Exactly four deterministic questions.
pub fn build_questions(
    domain: &str,
    columns: &[ColumnInfo],
    primary: &[String],
) -> Result<Vec<String>, InsightError> {
    let metric = primary.first().map(String::as_str);
    let time = columns.iter().find(|c| c.is(ColumnType::Datetime));
    let segment = columns.iter().find(|c| c.is(ColumnType::Categorical));

    let drivers = match metric {
        Some(m) => format!("Which factors drive the biggest changes in {}?", m),
        None => format!("Which measures best capture performance in this {} dataset?", domain),
    };

    let trend = match (time, metric) {
        (Some(t), Some(m)) => format!("How has {} trended over {}, and are there seasonal patterns?", m, t.name),
        (Some(t), None) => format!("How do record volumes change over {}?", t.name),
        (None, m) => format!(
            "What time-based data would help track {} over time?",
            m.unwrap_or("key metrics")
        ),
    };

    let segmentation = match (segment, metric) {
        (Some(s), Some(m)) => format!("Which {} segments contribute most to {}?", s.name, m),
        (Some(s), None) => format!("How are records distributed across {}?", s.name),
        (None, m) => format!(
            "How could the records be segmented to compare {}?",
            m.unwrap_or("performance")
        ),
    };

    let domain_question = DOMAIN_RULES
        .iter()
        .find(|rule| rule.domain == domain)
        .map(|rule| rule.question)
        .unwrap_or(GENERAL_QUESTION)
        .to_string();

    let questions = vec![drivers, trend, segmentation, domain_question];
    if questions.len() != QUESTION_COUNT {
        return Err(InsightError::QuestionCount(questions.len()));
    }
    Ok(questions)
}

/// Narrative on what the dataset can support.
pub fn describe_potential(
    columns: &[ColumnInfo],
    quality: &DataQualityMetrics,
) -> Result<String, InsightError> {
    if !quality.completeness.is_finite() || !quality.consistency.is_finite() {
        return Err(InsightError::InvalidQuality);
    }

    let count = |t: ColumnType| columns.iter().filter(|c| c.is(t)).count();
    let numerical = count(ColumnType::Numerical);
    let categorical = count(ColumnType::Categorical);
    let datetime = count(ColumnType::Datetime);

    let types: BTreeSet<ColumnType> = columns.iter().map(|c| c.inferred_type).collect();
    let type_list: Vec<&str> = types.iter().map(|t| t.as_str()).collect();

    let rating = match quality.overall() {
        q if q >= 0.85 => "high",
        q if q >= 0.6 => "moderate",
        _ => "limited",
    };

    let use_case = if datetime > 0 && numerical > 0 {
        "time-series and trend analysis"
    } else if numerical >= 2 {
        "correlation and comparative analysis"
    } else if numerical >= 1 && categorical > 0 {
        "segment comparison"
    } else {
        "descriptive profiling"
    };

    let mut text = format!(
        "The sample contains {} columns across {} data type{} ({}). With {:.0}% completeness and {:.0}% consistency, it has {} potential for {}.",
        columns.len(),
        types.len(),
        if types.len() == 1 { "" } else { "s" },
        type_list.join(", "),
        quality.completeness * 100.0,
        quality.consistency * 100.0,
        rating,
        use_case
    );
    if !quality.issues.is_empty() {
        text.push_str(&format!(
            " {} data-quality issue{} should be addressed first.",
            quality.issues.len(),
            if quality.issues.len() == 1 { "" } else { "s" }
        ));
    }
    Ok(text)
}

// =============================================================================
// Entry point
// =============================================================================

fn with_fallback<T>(field: &str, result: Result<T, InsightError>, default: impl FnOnce() -> T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log_stage(
                LogLevel::Warning,
                STAGE,
                format!("{}: {}, using default", field, e),
            );
            default()
        }
    }
}

fn default_questions() -> Vec<String> {
    vec![
        "Which measures matter most for the business?".to_string(),
        "How do key values change over time?".to_string(),
        "Which groups of records perform best and worst?".to_string(),
        GENERAL_QUESTION.to_string(),
    ]
}

/// Build all insight fields, each with its own fallback.
pub fn extract_insights(columns: &[ColumnInfo], quality: &DataQualityMetrics) -> BusinessInsights {
    let industry_domain = with_fallback("industryDomain", detect_domain(columns), || {
        DEFAULT_DOMAIN.to_string()
    });

    let primary_value_columns =
        with_fallback("primaryValueColumns", rank_value_columns(columns), Vec::new);

    let potential_correlations = with_fallback(
        "potentialCorrelations",
        find_correlations(columns, &primary_value_columns),
        || {
            vec!["Relationships can be explored once numerical measures are available".to_string()]
        },
    );

    let actionable_questions = with_fallback(
        "actionableQuestions",
        build_questions(&industry_domain, columns, &primary_value_columns),
        default_questions,
    );

    let dataset_potential = with_fallback(
        "datasetPotential",
        describe_potential(columns, quality),
        || "The sample supports descriptive profiling; collect more data for deeper analysis.".to_string(),
    );

    log_stage(
        LogLevel::Success,
        STAGE,
        format!(
            "Domain: {}, primary values: [{}]",
            industry_domain,
            primary_value_columns.join(", ")
        ),
    );

    BusinessInsights {
        industry_domain,
        primary_value_columns,
        potential_correlations,
        actionable_questions,
        dataset_potential,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, inferred_type: ColumnType, unique: usize) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            inferred_type,
            unique_value_count: unique,
            has_missing: false,
            sample_values: vec![],
        }
    }

    fn quality() -> DataQualityMetrics {
        DataQualityMetrics {
            completeness: 1.0,
            consistency: 1.0,
            issues: vec![],
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("unitPrice"), vec!["unit", "price"]);
        assert_eq!(tokenize("Total_Sales (USD)"), vec!["total", "sales", "usd"]);
        assert_eq!(tokenize("electricity"), vec!["electricity"]);
    }

    #[test]
    fn test_domain_first_match_wins() {
        let columns = vec![
            column("product", ColumnType::Text, 2),
            column("price", ColumnType::Numerical, 2),
            column("sales", ColumnType::Numerical, 2),
        ];
        // "sales" also matches a later rule
        assert_eq!(detect_domain(&columns).unwrap(), "E-commerce & Retail");

        let columns = vec![
            column("patient_id", ColumnType::Numerical, 2),
            column("price", ColumnType::Numerical, 2),
        ];
        assert_eq!(detect_domain(&columns).unwrap(), "Healthcare");
    }

    #[test]
    fn test_domain_from_sample_values() {
        let mut col = column("kind", ColumnType::Categorical, 2);
        col.sample_values = vec![json!("Loan"), json!("Deposit")];
        assert_eq!(detect_domain(&[col]).unwrap(), "Finance & Banking");
    }

    #[test]
    fn test_domain_default() {
        let columns = vec![column("alpha", ColumnType::Text, 2)];
        assert_eq!(detect_domain(&columns).unwrap(), DEFAULT_DOMAIN);
        assert!(detect_domain(&[]).is_err());
    }

    #[test]
    fn test_rank_value_columns() {
        let columns = vec![
            column("id", ColumnType::Numerical, 50),
            column("quantity", ColumnType::Numerical, 5),
            column("revenue", ColumnType::Numerical, 10),
            column("price", ColumnType::Numerical, 8),
            column("region", ColumnType::Categorical, 3),
        ];
        assert_eq!(
            rank_value_columns(&columns).unwrap(),
            vec!["revenue", "price", "quantity"]
        );
    }

    #[test]
    fn test_rank_uses_unique_count_as_tiebreak() {
        let columns = vec![
            column("a", ColumnType::Numerical, 3),
            column("b", ColumnType::Numerical, 9),
        ];
        assert_eq!(rank_value_columns(&columns).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_identifiers_rank_below_unnamed_measures() {
        let columns = vec![
            column("id", ColumnType::Numerical, 40),
            column("customerKey", ColumnType::Numerical, 40),
            column("reading", ColumnType::Numerical, 4),
        ];
        assert_eq!(
            rank_value_columns(&columns).unwrap(),
            vec!["reading", "id", "customerKey"]
        );
    }

    #[test]
    fn test_correlations() {
        let columns = vec![
            column("price", ColumnType::Numerical, 5),
            column("sales", ColumnType::Numerical, 5),
            column("region", ColumnType::Categorical, 3),
        ];
        let primary = vec!["sales".to_string(), "price".to_string()];
        let found = find_correlations(&columns, &primary).unwrap();
        assert_eq!(
            found,
            vec![
                "sales and price: pricing may influence demand",
                "sales may differ across region segments",
                "price may differ across region segments",
            ]
        );
    }

    #[test]
    fn test_questions_are_exactly_four_and_deterministic() {
        let columns = vec![
            column("date", ColumnType::Datetime, 5),
            column("region", ColumnType::Categorical, 3),
            column("revenue", ColumnType::Numerical, 5),
        ];
        let primary = vec!["revenue".to_string()];
        let first = build_questions("Sales & Revenue", &columns, &primary).unwrap();
        let second = build_questions("Sales & Revenue", &columns, &primary).unwrap();
        assert_eq!(first.len(), QUESTION_COUNT);
        assert_eq!(first, second);
        assert!(first[1].contains("revenue trended over date"));
        assert!(first[2].contains("region segments"));
        assert_eq!(first[3], "Which segments generate the most profitable revenue?");
    }

    #[test]
    fn test_questions_without_metrics() {
        let questions = build_questions(DEFAULT_DOMAIN, &[], &[]).unwrap();
        assert_eq!(questions.len(), 4);
        assert!(questions[1].contains("key metrics"));
        assert_eq!(questions[3], GENERAL_QUESTION);
    }

    #[test]
    fn test_potential_rejects_nan() {
        let bad = DataQualityMetrics {
            completeness: f64::NAN,
            consistency: 1.0,
            issues: vec![],
        };
        assert!(describe_potential(&[], &bad).is_err());
    }

    #[test]
    fn test_extract_insights_with_fallbacks() {
        let columns = vec![column("notes", ColumnType::Text, 40)];
        let insights = extract_insights(&columns, &quality());

        assert_eq!(insights.industry_domain, DEFAULT_DOMAIN);
        assert!(insights.primary_value_columns.is_empty());
        assert_eq!(insights.potential_correlations.len(), 1);
        assert_eq!(insights.actionable_questions.len(), 4);
        assert!(insights.dataset_potential.contains("descriptive profiling"));
    }

    #[test]
    fn test_extract_insights_nan_quality_degrades_one_field() {
        let columns = vec![column("price", ColumnType::Numerical, 5)];
        let bad = DataQualityMetrics {
            completeness: f64::NAN,
            consistency: 1.0,
            issues: vec![],
        };
        let insights = extract_insights(&columns, &bad);
        assert_eq!(insights.primary_value_columns, vec!["price"]);
        assert!(insights.dataset_potential.contains("descriptive profiling"));
    }
}
