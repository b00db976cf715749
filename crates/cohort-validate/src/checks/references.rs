//! Names read across rules and the dependency graph they form.

use std::collections::BTreeSet;

use cohort_model::{ModelError, POPULATION, StudyDefinition};

use crate::issue::Issue;

pub fn check(study: &StudyDefinition) -> Vec<Issue> {
    let mut issues = Vec::new();
    let defined: BTreeSet<&str> = study
        .variables()
        .iter()
        .map(|variable| variable.name.as_str())
        .collect();

    issues.extend(
        study
            .population()
            .external_references()
            .into_iter()
            .filter(|name| !defined.contains(name.as_str()))
            .map(|name| Issue::UndefinedPopulationReference { name }),
    );

    for rule in study.rules() {
        let Some(categorisation) = rule.variable.query.categorisation() else {
            continue;
        };
        if categorisation.references().contains(POPULATION) {
            issues.push(Issue::PopulationReferenced {
                variable: rule.path(),
            });
        }
    }

    if let Err(ModelError::DependencyCycle { cycle }) = study.evaluation_order() {
        issues.push(Issue::DependencyCycle { cycle });
    }

    issues
}
