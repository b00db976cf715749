//! Issues gathered for one study definition or registry.

use serde::Serialize;

use crate::error::{Result, ValidationError};
use crate::issue::{Category, Issue, Severity};

/// Validation report for one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Study name, or the registry label.
    pub subject: String,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            issues: Vec::new(),
        }
    }

    pub fn add(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(move |issue| issue.category() == category)
    }

    /// Rule ids raised, in report order, with duplicates.
    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.issues.iter().map(Issue::rule_id).collect()
    }

    /// The report itself when it holds no errors.
    pub fn into_result(self) -> Result<Self> {
        if self.has_errors() {
            return Err(ValidationError::ValidationFailed {
                errors: self.error_count(),
                warnings: self.warning_count(),
                subject: self.subject,
            });
        }
        Ok(self)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity() == severity)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning() -> Issue {
        Issue::EmptyCodelist {
            variable: "cf".to_string(),
            reference: "cf_codes".to_string(),
        }
    }

    #[test]
    fn warnings_alone_pass() {
        let mut report = ValidationReport::new("primary");
        report.add(warning());
        assert_eq!(report.warning_count(), 1);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn errors_fail_with_counts() {
        let mut report = ValidationReport::new("flow-chart");
        report.add(warning());
        report.add(Issue::FlowChartPopulation);
        let err = report.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "flow-chart failed validation with 1 error(s) and 1 warning(s)"
        );
    }

    #[test]
    fn serializes_issues_by_variant() {
        let mut report = ValidationReport::new("primary");
        report.add(warning());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["subject"], "primary");
        assert_eq!(json["issues"][0]["EmptyCodelist"]["reference"], "cf_codes");
    }
}
