//! Synthetic-data expectations: ratios, incidence and date ranges.

use chrono::NaiveDate;
use cohort_model::{DateRange, Expectations, StudyDefinition};

use crate::issue::Issue;

/// Label used for the study-wide default expectations.
pub const DEFAULTS_SUBJECT: &str = "default_expectations";

const RATIO_TOLERANCE: f64 = 1e-6;

pub fn check(study: &StudyDefinition, today: NaiveDate) -> Vec<Issue> {
    let index_date = study.index_date();
    let defaults = study.default_expectations();
    let mut issues = check_own(DEFAULTS_SUBJECT, defaults);
    issues.extend(inverted_range(DEFAULTS_SUBJECT, defaults.date, index_date, today));

    for rule in study.rules() {
        let own = rule.variable.expectations();
        let path = rule.path();
        issues.extend(check_own(&path, own));
        // Ranges inherited whole from the defaults were checked above
        if own.date.is_some() {
            let merged = own.merged_over(defaults);
            issues.extend(inverted_range(&path, merged.date, index_date, today));
        }
    }
    issues
}

fn check_own(subject: &str, expectations: &Expectations) -> Vec<Issue> {
    let mut issues = Vec::new();
    if let Some(ratios) = &expectations.category {
        let sum = ratios.sum();
        if !sum.is_finite() || (sum - 1.0).abs() > RATIO_TOLERANCE {
            issues.push(Issue::RatiosDoNotSumToOne {
                variable: subject.to_string(),
                sum,
            });
        }
    }
    if let Some(incidence) = expectations.incidence
        && !(0.0..=1.0).contains(&incidence)
    {
        issues.push(Issue::IncidenceOutOfRange {
            variable: subject.to_string(),
            incidence,
        });
    }
    issues
}

fn inverted_range(
    subject: &str,
    range: Option<DateRange>,
    index_date: NaiveDate,
    today: NaiveDate,
) -> Option<Issue> {
    let range = range?;
    let (earliest_bound, latest_bound) = (range.earliest?, range.latest?);
    let earliest = earliest_bound.resolve(index_date, today).ok()?;
    let latest = latest_bound.resolve(index_date, today).ok()?;
    (earliest > latest).then(|| Issue::InvertedDateRange {
        variable: subject.to_string(),
        earliest: format!("{earliest_bound} ({earliest})"),
        latest: format!("{latest_bound} ({latest})"),
    })
}
