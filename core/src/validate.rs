//! Optional range checks for search and ranking filters.
//!
//! The query builders accept any values; callers that want to reject bad
//! input before querying run these first.

use std::ops::RangeInclusive;

use serde::Serialize;

use crate::queries::ranking::RankFilters;
use crate::queries::search::SearchFilters;

pub const GENERATION_RANGE: RangeInclusive<i64> = 1..=9;
pub const LIMIT_RANGE: RangeInclusive<i64> = 1..=100;
/// Six stats, each capped at 255.
pub const MIN_TOTAL_RANGE: RangeInclusive<i64> = 0..=1530;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

pub fn validate_search(filters: &SearchFilters) -> Validation {
    let mut errors = Vec::new();
    check_name("tag", filters.tag.as_deref(), &mut errors);
    check_name("ability", filters.ability.as_deref(), &mut errors);
    check_range("generation", filters.generation, &GENERATION_RANGE, &mut errors);
    check_range("min_total", filters.min_total, &MIN_TOTAL_RANGE, &mut errors);
    check_range("limit", filters.limit, &LIMIT_RANGE, &mut errors);
    Validation::from_errors(errors)
}

pub fn validate_rank(filters: &RankFilters) -> Validation {
    let mut errors = Vec::new();
    check_name("tag", filters.tag.as_deref(), &mut errors);
    check_range("generation", filters.generation, &GENERATION_RANGE, &mut errors);
    check_range("limit", filters.limit, &LIMIT_RANGE, &mut errors);
    Validation::from_errors(errors)
}

fn check_name(field: &str, value: Option<&str>, errors: &mut Vec<String>) {
    if let Some(v) = value {
        if v.trim().is_empty() {
            errors.push(format!("{field} must not be empty"));
        }
    }
}

fn check_range(
    field: &str,
    value: Option<i64>,
    range: &RangeInclusive<i64>,
    errors: &mut Vec<String>,
) {
    if let Some(v) = value {
        if !range.contains(&v) {
            errors.push(format!(
                "{field} must be between {} and {}, got {v}",
                range.start(),
                range.end()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_are_valid() {
        assert!(validate_search(&SearchFilters::default()).valid);
        assert!(validate_rank(&RankFilters::default()).valid);
    }

    #[test]
    fn collects_every_error() {
        let v = validate_search(&SearchFilters {
            tag: Some("  ".into()),
            generation: Some(0),
            min_total: Some(-1),
            limit: Some(500),
            ..Default::default()
        });
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 4);
        assert!(v.errors.iter().any(|e| e.starts_with("generation")));
        assert!(v.errors.iter().any(|e| e.contains("got 500")));
    }

    #[test]
    fn bounds_are_inclusive() {
        let v = validate_rank(&RankFilters {
            tag: Some("fire".into()),
            generation: Some(9),
            limit: Some(100),
        });
        assert!(v.valid, "{:?}", v.errors);
    }
}
