//! The study's two definitions and attrition counting.
//!
//! [`primary_definition`] builds the analysis dataset definition and
//! [`flow_chart_definition`] the attrition definition. Both are anchored
//! at [`INDEX_DATE`]. [`count_attrition`] tabulates survivors over an
//! extract the external engine produced for the flow chart.

pub mod attrition;
mod common;
pub mod error;
pub mod flow_chart;
pub mod primary;

use cohort_model::StudyDefinition;

pub use attrition::{
    AGE_RANGE, AttritionStep, AttritionTable, Criterion, Extract, ExtractRow, count_attrition,
};
pub use common::INDEX_DATE;
pub use error::{Result, StudyError};
pub use flow_chart::{ATTRITION_SEQUENCE, FLOW_CHART_STUDY, check_sequence, flow_chart_definition};
pub use primary::{PRIMARY_STUDY, primary_definition};

/// Names accepted by [`definition`].
pub const STUDY_NAMES: [&str; 2] = [PRIMARY_STUDY, FLOW_CHART_STUDY];

/// Look up a definition by name.
pub fn definition(name: &str) -> Result<StudyDefinition> {
    match name.trim() {
        PRIMARY_STUDY => primary_definition(),
        FLOW_CHART_STUDY | "flow_chart" => flow_chart_definition(),
        other => Err(StudyError::UnknownStudy {
            name: other.to_string(),
            known: STUDY_NAMES.iter().map(|name| (*name).to_string()).collect(),
        }),
    }
}

/// Every definition, primary first.
pub fn all_definitions() -> Result<Vec<StudyDefinition>> {
    STUDY_NAMES.into_iter().map(definition).collect()
}
