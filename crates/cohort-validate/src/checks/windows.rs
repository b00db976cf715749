//! Temporal windows resolved against the index date.

use cohort_model::StudyDefinition;

use crate::issue::Issue;

pub fn check(study: &StudyDefinition) -> Vec<Issue> {
    let index_date = study.index_date();
    let mut issues = Vec::new();

    for rule in study.rules() {
        let window = rule.variable.window();
        match window.resolve(index_date) {
            Ok(resolved) if !resolved.is_ordered() => {
                let (Some(start), Some(end)) = (resolved.start, resolved.end) else {
                    continue;
                };
                issues.push(Issue::InvertedWindow {
                    variable: rule.path(),
                    window: window.to_string(),
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
            Ok(_) => {}
            Err(error) => issues.push(Issue::UnresolvableWindow {
                variable: rule.path(),
                window: window.to_string(),
                message: error.to_string(),
            }),
        }
    }

    issues
}
