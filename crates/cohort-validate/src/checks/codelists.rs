//! Codelist references against the registry.

use cohort_codelists::{CodelistRegistry, RegistryLoad};
use cohort_model::{CodelistRef, StudyDefinition};

use crate::issue::Issue;

/// Check every codelist reference a study's rules make.
pub fn check(study: &StudyDefinition, registry: &CodelistRegistry) -> Vec<Issue> {
    let mut issues = Vec::new();

    for usage in study.codelist_refs() {
        let reference = usage.reference;
        let missing: Vec<&str> = reference
            .names()
            .into_iter()
            .filter(|name| !registry.contains(name))
            .collect();
        if !missing.is_empty() {
            issues.push(Issue::UnresolvedCodelist {
                variable: usage.variable.clone(),
                reference: reference.to_string(),
                reason: format!("not registered: {}", missing.join(", ")),
            });
            continue;
        }

        if let CodelistRef::Filtered { base, include } = reference {
            issues.extend(absent_categories(&usage.variable, base, include, registry));
        }

        match registry.resolve(reference) {
            Ok(codelist) if codelist.is_empty() => issues.push(Issue::EmptyCodelist {
                variable: usage.variable.clone(),
                reference: reference.to_string(),
            }),
            Ok(_) => {}
            Err(error) => issues.push(Issue::UnresolvedCodelist {
                variable: usage.variable.clone(),
                reference: reference.to_string(),
                reason: error.to_string(),
            }),
        }
    }

    issues
}

fn absent_categories(
    variable: &str,
    base: &str,
    include: &[String],
    registry: &CodelistRegistry,
) -> Vec<Issue> {
    let Some(codelist) = registry.get(base) else {
        return Vec::new();
    };
    // Uncategorised bases fail to resolve and are reported there
    if !codelist.is_categorised() {
        return Vec::new();
    }
    let present = codelist.category_labels();
    include
        .iter()
        .filter(|category| !present.contains(category.trim()))
        .map(|category| Issue::FilterCategoryAbsent {
            variable: variable.to_string(),
            codelist: base.to_string(),
            category: category.clone(),
        })
        .collect()
}

/// Pairs of registered codelists holding the same codes under different
/// coding systems.
pub fn duplicates(registry: &CodelistRegistry) -> Vec<Issue> {
    let entries: Vec<_> = registry.iter().collect();
    let mut issues = Vec::new();
    for (position, first) in entries.iter().enumerate() {
        for second in &entries[position + 1..] {
            let (a, b) = (&first.codelist, &second.codelist);
            if a.system() != b.system() && !a.is_empty() && a.same_codes(b) {
                issues.push(Issue::DuplicateCodelistContent {
                    first: first.name.clone(),
                    first_system: a.system().to_string(),
                    second: second.name.clone(),
                    second_system: b.system().to_string(),
                });
            }
        }
    }
    issues
}

/// Declarations that failed to load.
pub fn load_failures(load: &RegistryLoad) -> Vec<Issue> {
    load.failures
        .iter()
        .map(|failure| Issue::CodelistLoadFailed {
            codelist: failure.name.clone(),
            message: failure.error.to_string(),
        })
        .collect()
}
