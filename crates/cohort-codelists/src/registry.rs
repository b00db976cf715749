//! Named codelist registry.

use std::collections::BTreeMap;
use std::path::Path;

use cohort_model::{Codelist, CodelistRef};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::declarations::{CodelistDeclaration, study_codelists};
use crate::error::{CodelistError, Result};

/// A codelist together with the name rules use and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredCodelist {
    pub name: String,
    pub origin: String,
    pub codelist: Codelist,
}

/// Codelists keyed by name, iterated in name order.
#[derive(Debug, Clone, Default)]
pub struct CodelistRegistry {
    entries: BTreeMap<String, RegisteredCodelist>,
}

impl CodelistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a codelist under `name`. Names are registered once.
    pub fn register(&mut self, name: &str, codelist: Codelist, origin: &str) -> Result<()> {
        let name = name.trim();
        if self.entries.contains_key(name) {
            return Err(CodelistError::DuplicateName {
                name: name.to_string(),
            });
        }
        debug!(name, origin, codes = codelist.len(), "registered codelist");
        self.entries.insert(
            name.to_string(),
            RegisteredCodelist {
                name: name.to_string(),
                origin: origin.to_string(),
                codelist,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Codelist> {
        self.entries.get(name).map(|entry| &entry.codelist)
    }

    pub fn entry(&self, name: &str) -> Option<&RegisteredCodelist> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCodelist> {
        self.entries.values()
    }

    /// Materialise a rule's codelist reference.
    pub fn resolve(&self, reference: &CodelistRef) -> Result<Codelist> {
        match reference {
            CodelistRef::Named(name) => self.require(name).cloned(),
            CodelistRef::Filtered { base, include } => self
                .require(base)?
                .filter_by_category(include.as_slice())
                .map_err(|source| CodelistError::Resolve {
                    reference: reference.to_string(),
                    source,
                }),
            CodelistRef::Combined(names) => {
                let lists = names
                    .iter()
                    .map(|name| self.require(name))
                    .collect::<Result<Vec<_>>>()?;
                Codelist::combine(&lists).map_err(|source| CodelistError::Resolve {
                    reference: reference.to_string(),
                    source,
                })
            }
        }
    }

    fn require(&self, name: &str) -> Result<&Codelist> {
        self.get(name).ok_or_else(|| CodelistError::UnknownCodelist {
            name: name.to_string(),
        })
    }
}

/// A declaration that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub error: CodelistError,
}

/// Result of loading every declaration, keeping going past failures.
#[derive(Debug, Default)]
pub struct RegistryLoad {
    pub registry: CodelistRegistry,
    pub failures: Vec<LoadFailure>,
}

impl RegistryLoad {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The registry, or the first failure.
    pub fn into_result(self) -> Result<CodelistRegistry> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.registry),
        }
    }
}

/// Load every declaration, recording failures instead of stopping.
pub fn collect_registry(dir: &Path, declarations: &[CodelistDeclaration]) -> RegistryLoad {
    let mut load = RegistryLoad::default();
    for declaration in declarations {
        let outcome = declaration.load(dir).and_then(|codelist| {
            load.registry.register(
                &declaration.name,
                codelist,
                &declaration.source.to_string(),
            )
        });
        if let Err(error) = outcome {
            warn!(name = %declaration.name, %error, "codelist failed to load");
            load.failures.push(LoadFailure {
                name: declaration.name.clone(),
                error,
            });
        }
    }
    info!(
        dir = %dir.display(),
        loaded = load.registry.len(),
        failed = load.failures.len(),
        "loaded codelists"
    );
    load
}

/// Load every declaration, failing on the first error.
pub fn load_registry(dir: &Path, declarations: &[CodelistDeclaration]) -> Result<CodelistRegistry> {
    let mut registry = CodelistRegistry::new();
    for declaration in declarations {
        let codelist = declaration.load(dir)?;
        registry.register(&declaration.name, codelist, &declaration.source.to_string())?;
    }
    info!(dir = %dir.display(), loaded = registry.len(), "loaded codelists");
    Ok(registry)
}

/// Load the study's own codelists from `dir`.
pub fn load_study_registry(dir: &Path) -> Result<CodelistRegistry> {
    load_registry(dir, &study_codelists())
}

#[cfg(test)]
mod tests {
    use cohort_model::{CodingSystem, combine_codelists, filter_codes_by_category};

    use super::*;

    fn registry() -> CodelistRegistry {
        let mut registry = CodelistRegistry::new();
        registry
            .register(
                "clear_smoking_codes",
                Codelist::from_categorised_rows(
                    CodingSystem::Ctv3,
                    [("137L.", "S"), ("137S.", "E"), ("1371.", "N")],
                )
                .unwrap(),
                "opensafely-smoking-clear.csv",
            )
            .unwrap();
        registry
            .register(
                "hba1c_new_codes",
                Codelist::new(CodingSystem::Ctv3, ["XaPbt", "Xaeze"]).unwrap(),
                "inline",
            )
            .unwrap();
        registry
            .register(
                "hba1c_old_codes",
                Codelist::new(CodingSystem::Ctv3, ["X772q"]).unwrap(),
                "inline",
            )
            .unwrap();
        registry
            .register(
                "covid_codelist",
                Codelist::new(CodingSystem::Icd10, ["U071", "U072"]).unwrap(),
                "inline",
            )
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = registry();
        let err = registry
            .register(
                "covid_codelist",
                Codelist::new(CodingSystem::Icd10, ["U071"]).unwrap(),
                "inline",
            )
            .unwrap_err();
        assert!(matches!(err, CodelistError::DuplicateName { name } if name == "covid_codelist"));
    }

    #[test]
    fn filtered_reference_keeps_selected_categories() {
        let registry = registry();
        let ever_smoked = registry
            .resolve(&filter_codes_by_category("clear_smoking_codes", &["S", "E"]))
            .unwrap();
        assert!(ever_smoked.contains("137L."));
        assert!(ever_smoked.contains("137S."));
        assert!(!ever_smoked.contains("1371."));
    }

    #[test]
    fn filtering_an_uncategorised_list_fails() {
        let registry = registry();
        let err = registry
            .resolve(&filter_codes_by_category("hba1c_new_codes", &["S"]))
            .unwrap_err();
        assert!(matches!(err, CodelistError::Resolve { .. }));
    }

    #[test]
    fn combined_reference_is_a_union() {
        let registry = registry();
        let hba1c = registry
            .resolve(&combine_codelists(&["hba1c_new_codes", "hba1c_old_codes"]))
            .unwrap();
        assert_eq!(hba1c.len(), 3);
    }

    #[test]
    fn combining_across_systems_fails() {
        let registry = registry();
        let err = registry
            .resolve(&combine_codelists(&["hba1c_new_codes", "covid_codelist"]))
            .unwrap_err();
        assert!(matches!(err, CodelistError::Resolve { .. }));
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let registry = registry();
        let err = registry
            .resolve(&CodelistRef::named("covid_positive_test"))
            .unwrap_err();
        assert!(matches!(err, CodelistError::UnknownCodelist { .. }));
    }

    #[test]
    fn iteration_is_in_name_order() {
        let registry = registry();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "clear_smoking_codes",
                "covid_codelist",
                "hba1c_new_codes",
                "hba1c_old_codes"
            ]
        );
    }
}
