//! Categorisation rules: default reachability, condition scope and
//! expected category labels.

use std::collections::BTreeSet;

use cohort_expr::MissingScope;
use cohort_model::{Categorisation, POPULATION, StudyDefinition};
use tracing::warn;

use crate::issue::Issue;

pub fn check(study: &StudyDefinition) -> Vec<Issue> {
    let mut issues = Vec::new();
    for variable in study.variables() {
        let Some(categorisation) = variable.query.categorisation() else {
            continue;
        };
        let name = variable.name.as_str();

        // A subject with no records must fall through to the default
        match categorisation.evaluate(&MissingScope) {
            Ok(label) if label != categorisation.default_label() => {
                issues.push(Issue::DefaultUnreachable {
                    variable: name.to_string(),
                    default: categorisation.default_label().to_string(),
                    label: label.to_string(),
                });
            }
            Ok(_) => {}
            Err(error) => warn!(variable = name, %error, "condition failed on an empty subject"),
        }

        // Population reads are reported by the reference checks
        issues.extend(
            variable
                .external_references()
                .into_iter()
                .filter(|reference| reference != POPULATION)
                .map(|reference| Issue::ConditionOutsideScope {
                    variable: name.to_string(),
                    name: reference,
                }),
        );

        if let Some(issue) = label_mismatch(name, categorisation) {
            issues.push(issue);
        }
    }
    issues
}

fn label_mismatch(variable: &str, categorisation: &Categorisation) -> Option<Issue> {
    let ratios = categorisation.expectations().category.as_ref()?;
    let declared: BTreeSet<&str> = categorisation.labels().collect();
    let expected: BTreeSet<&str> = ratios.labels().collect();
    if declared == expected {
        return None;
    }
    Some(Issue::CategoryLabelsMismatch {
        variable: variable.to_string(),
        missing: declared
            .difference(&expected)
            .map(|label| (*label).to_string())
            .collect(),
        unexpected: expected
            .difference(&declared)
            .map(|label| (*label).to_string())
            .collect(),
    })
}
