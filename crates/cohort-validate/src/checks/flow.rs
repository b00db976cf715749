//! Attrition order of the flow-chart definition.

use cohort_model::StudyDefinition;
use cohort_study::{FLOW_CHART_STUDY, StudyError, check_sequence};

use crate::issue::Issue;

/// Only the flow-chart definition is checked; other studies pass.
pub fn check(study: &StudyDefinition) -> Vec<Issue> {
    if study.name() != FLOW_CHART_STUDY {
        return Vec::new();
    }
    match check_sequence(study) {
        Err(StudyError::FlowChartOrder { expected, found }) => {
            vec![Issue::FlowChartOrder { expected, found }]
        }
        Err(StudyError::FlowChartPopulation) => vec![Issue::FlowChartPopulation],
        _ => Vec::new(),
    }
}
