use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use cohort_codelists::{
    CodelistError, CodelistSource, collect_registry, load_study_registry, study_codelists,
};
use cohort_model::{CodingSystem, filter_codes_by_category};
use tempfile::TempDir;

/// Write one small CSV per distinct file the study declares.
fn write_fixture(dir: &Path) {
    let mut written = BTreeSet::new();
    for declaration in study_codelists() {
        let CodelistSource::Csv { file, column, .. } = &declaration.source else {
            continue;
        };
        if !written.insert(file.clone()) {
            continue;
        }
        let body = match file.to_str() {
            Some("opensafely-ethnicity.csv") => {
                "Code,Grouping_6,Grouping_16\nY123,3,11\nXaJQv,1,2\n".to_string()
            }
            Some("opensafely-smoking-clear.csv") => {
                "CTV3Code,Category\n137L.,S\n137S.,E\n1371.,N\n".to_string()
            }
            Some("opensafely-smoking-unclear.csv") => "CTV3Code,Category\n137..,U\n".to_string(),
            _ => format!("{column},Description\n{}.1,first\n", declaration.name),
        };
        fs::write(dir.join(file), body).unwrap();
    }
}

#[test]
fn study_registry_loads_every_declaration() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let registry = load_study_registry(dir.path()).unwrap();
    assert_eq!(registry.len(), study_codelists().len());

    let ethnicity = registry.get("ethnicity_codes").unwrap();
    assert_eq!(ethnicity.category("Y123"), Some("3"));
    let ethnicity_16 = registry.get("ethnicity_codes_16").unwrap();
    assert_eq!(ethnicity_16.category("Y123"), Some("11"));

    let pred = registry.get("pred_codes").unwrap();
    assert_eq!(pred.system(), CodingSystem::Snomed);

    let smoked = registry
        .resolve(&filter_codes_by_category("clear_smoking_codes", &["S"]))
        .unwrap();
    assert_eq!(smoked.codes().collect::<Vec<_>>(), vec!["137L."]);
}

#[test]
fn missing_file_fails_strict_load() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    fs::remove_file(dir.path().join("opensafely-dementia.csv")).unwrap();

    let err = load_study_registry(dir.path()).unwrap_err();
    assert!(matches!(err, CodelistError::MissingSourceFile { .. }));
}

#[test]
fn collecting_load_keeps_going() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    fs::remove_file(dir.path().join("opensafely-dementia.csv")).unwrap();
    fs::write(
        dir.path().join("opensafely-transient-ischaemic-attack.csv"),
        "CTV3ID,Description\nG65..,tia\n",
    )
    .unwrap();

    let load = collect_registry(dir.path(), &study_codelists());
    assert!(!load.is_complete());
    let failed: Vec<&str> = load.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["dementia", "tia"]);
    assert!(matches!(
        load.failures[1].error,
        CodelistError::SchemaMismatch { .. }
    ));
    assert_eq!(load.registry.len(), study_codelists().len() - 2);
}
