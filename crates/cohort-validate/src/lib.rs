//! Consistency checks over study definitions and the codelist registry.
//!
//! Checks produce [`Issue`]s gathered into a [`ValidationReport`]. A report
//! with errors blocks export; warnings are advisory.

pub mod checks;
pub mod error;
pub mod issue;
pub mod report;

use chrono::{Local, NaiveDate};
use cohort_codelists::{CodelistRegistry, RegistryLoad};
use cohort_model::StudyDefinition;
use tracing::info;

pub use error::{Result, ValidationError};
pub use issue::{Category, Issue, Severity};
pub use report::ValidationReport;

/// Subject name of registry reports.
pub const REGISTRY_SUBJECT: &str = "codelists";

#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub registry: Option<&'a CodelistRegistry>,
    /// Date `today` resolves to in expectation ranges.
    pub today: NaiveDate,
}

impl Default for ValidationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ValidationContext<'a> {
    pub fn new() -> Self {
        Self {
            registry: None,
            today: Local::now().date_naive(),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: &'a CodelistRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Validate one study definition.
pub fn validate_study(study: &StudyDefinition, ctx: &ValidationContext<'_>) -> ValidationReport {
    let report = checks::run_all(study, ctx);
    info!(
        study = study.name(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        codelists_checked = ctx.registry.is_some(),
        "validated study definition"
    );
    report
}

/// Validate a registry load: failed declarations and duplicate content.
pub fn validate_registry(load: &RegistryLoad) -> ValidationReport {
    let mut report = ValidationReport::new(REGISTRY_SUBJECT);
    report.extend(checks::codelists::load_failures(load));
    report.extend(checks::codelists::duplicates(&load.registry));
    info!(
        codelists = load.registry.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        "validated codelist registry"
    );
    report
}
