//! Validation check modules.
//!
//! Each module performs one kind of consistency check.

mod categories;
pub mod codelists;
pub mod expectations;
mod flow;
mod references;
mod windows;

use cohort_model::StudyDefinition;

use crate::ValidationContext;
use crate::report::ValidationReport;

/// Run all checks on one study definition.
pub fn run_all(study: &StudyDefinition, ctx: &ValidationContext<'_>) -> ValidationReport {
    let mut report = ValidationReport::new(study.name());

    // 1. Codelist references (only with a registry to resolve against)
    if let Some(registry) = ctx.registry {
        report.extend(codelists::check(study, registry));
    }

    // 2. Windows resolve and are ordered
    report.extend(windows::check(study));

    // 3. Categorisation defaults, scope and labels
    report.extend(categories::check(study));

    // 4. Cross-rule references and cycles
    report.extend(references::check(study));

    // 5. Expectations
    report.extend(expectations::check(study, ctx.today));

    // 6. Flow-chart attrition order
    report.extend(flow::check(study));

    report
}
