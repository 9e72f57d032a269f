//! Identifier normalization and the two heuristic classifiers: table
//! fact/dimension tagging and field-transformation detection.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{TableClass, Transformation};

/// Normalizes an identifier for comparison: lowercases it and strips a
/// `${...}` templating wrapper, so a templated reference matches its literal
/// counterpart. Both sides of every comparison go through here.
pub fn match_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        Some(inner) => inner.to_owned(),
        None => lower,
    }
}

/// Substrings marking measure-heavy warehouse layers.
const FACT_MARKERS: &[&str] = &["app", "dm", "dwd", "dws"];

/// Classifies a physical table name by naming convention. Runs only for
/// names that did not resolve to a known unit in the current scope.
pub fn classify_table(full_name: &str) -> TableClass {
    let lower = full_name.to_lowercase();
    if FACT_MARKERS.iter().any(|m| lower.contains(m)) {
        TableClass::Fact
    } else {
        TableClass::Dimension
    }
}

static AGGREGATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(sum|count|avg|max|min|group_concat|string_agg|array_agg|listagg|collect_list|collect_set)\s*\(",
    )
    .unwrap()
});

static WINDOW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\)\s*over\s*\(").unwrap());

static EXPLODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(unnest|explode|lateral\s+flatten)\s*\(").unwrap());

static CONCAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bconcat(_ws)?\s*\(").unwrap());

static CASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcase\b").unwrap());

static CONVERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cast|convert|to_date|to_char|to_number|date_format)\s*\(").unwrap()
});

static NULL_HANDLING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(coalesce|nvl|ifnull|isnull)\s*\(").unwrap());

static STRING_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(substr|substring|trim|ltrim|rtrim|upper|lower|replace|lpad|rpad|split|length|instr|regexp_replace|regexp_extract|regexp_substr|regexp_like)\s*\(",
    )
    .unwrap()
});

static DATE_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(dateadd|datediff|date_add|date_sub|date_trunc|extract|year|month|day|datepart|last_day|add_months|months_between|unix_timestamp|from_unixtime)\s*\(",
    )
    .unwrap()
});

static ARITHMETIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+\-*/%]|\|\|").unwrap());

/// Tags a field expression with exactly one transformation label by testing
/// the pattern categories in a fixed priority order and returning the first
/// match.
pub fn detect_transformation(expression: &str) -> Transformation {
    let expr = expression.trim();
    if AGGREGATE_RE.is_match(expr) {
        Transformation::Aggregate
    } else if WINDOW_RE.is_match(expr) {
        Transformation::Window
    } else if EXPLODE_RE.is_match(expr) {
        Transformation::Explode
    } else if CONCAT_RE.is_match(expr) || expr.contains("||") {
        Transformation::StringConcat
    } else if CASE_RE.is_match(expr) {
        Transformation::Conditional
    } else if CONVERSION_RE.is_match(expr) {
        Transformation::TypeConversion
    } else if NULL_HANDLING_RE.is_match(expr) {
        Transformation::NullHandling
    } else if STRING_FN_RE.is_match(expr) {
        Transformation::StringFunction
    } else if DATE_FN_RE.is_match(expr) {
        Transformation::DateFunction
    } else if expr == "*" || expr.ends_with(".*") {
        Transformation::SelectAll
    } else if !expr.contains('(') && ARITHMETIC_RE.is_match(expr) {
        Transformation::Arithmetic
    } else {
        Transformation::RawField
    }
}
