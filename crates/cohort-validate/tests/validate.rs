use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use cohort_codelists::{
    CodelistRegistry, CodelistSource, collect_registry, load_study_registry, study_codelists,
};
use cohort_model::{
    Codelist, CodingSystem, InWindow, StudyDefinition, filter_codes_by_category, patients,
};
use cohort_study::{
    ATTRITION_SEQUENCE, FLOW_CHART_STUDY, flow_chart_definition, primary_definition,
};
use cohort_validate::{Issue, ValidationContext, validate_registry, validate_study};
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
}

/// One small CSV per distinct file the study declares.
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

fn study_registry() -> (TempDir, CodelistRegistry) {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let registry = load_study_registry(dir.path()).unwrap();
    (dir, registry)
}

fn describe(issues: &[Issue]) -> Vec<String> {
    issues
        .iter()
        .map(|issue| format!("{} {}", issue.rule_id(), issue.message()))
        .collect()
}

#[test]
fn shipped_definitions_have_no_errors() {
    let (_dir, registry) = study_registry();
    let ctx = ValidationContext::new()
        .with_registry(&registry)
        .with_today(today());

    for study in [primary_definition().unwrap(), flow_chart_definition().unwrap()] {
        let report = validate_study(&study, &ctx);
        assert!(
            !report.has_errors(),
            "{}: {:?}",
            study.name(),
            describe(&report.issues)
        );
    }
}

#[test]
fn unregistered_codelist_is_an_error() {
    let (_dir, full) = study_registry();
    let mut registry = CodelistRegistry::new();
    for entry in full.iter().filter(|entry| entry.name != "ethnicity_codes") {
        registry
            .register(&entry.name, entry.codelist.clone(), &entry.origin)
            .unwrap();
    }
    let ctx = ValidationContext::new()
        .with_registry(&registry)
        .with_today(today());

    let report = validate_study(&flow_chart_definition().unwrap(), &ctx);
    assert_eq!(report.rule_ids(), vec!["CD0001"]);
    assert_eq!(report.issues[0].subject(), Some("ethnicity"));
    assert!(report.into_result().is_err());
}

#[test]
fn absent_filter_category_and_empty_result_warn() {
    let mut registry = CodelistRegistry::new();
    let smoking =
        Codelist::from_categorised_rows(CodingSystem::Ctv3, [("137L.", "S"), ("1371.", "N")])
            .unwrap();
    registry.register("clear_smoking_codes", smoking, "test").unwrap();

    let study = StudyDefinition::builder("filters", "2020-03-01")
        .population(patients::all())
        .variable(
            "ex_smoker",
            patients::with_these_clinical_events(filter_codes_by_category(
                "clear_smoking_codes",
                &["E"],
            ))
            .on_or_before("index_date")
            .unwrap(),
        )
        .build()
        .unwrap();
    let ctx = ValidationContext::new()
        .with_registry(&registry)
        .with_today(today());

    let report = validate_study(&study, &ctx);
    assert_eq!(report.rule_ids(), vec!["CD0002", "CD0003"]);
    assert_eq!(report.warning_count(), 2);
    assert!(report.into_result().is_ok());
}

#[test]
fn reordered_flow_chart_is_reported() {
    let shipped = flow_chart_definition().unwrap();
    let mut builder =
        StudyDefinition::builder(FLOW_CHART_STUDY, "2020-03-01").population(patients::all());
    for name in ATTRITION_SEQUENCE.iter().rev() {
        let variable = shipped.variable(name).unwrap();
        builder = builder.variable(name, variable.query.clone());
    }
    let reordered = builder.build().unwrap();

    let report = validate_study(&reordered, &ValidationContext::new().with_today(today()));
    assert_eq!(report.rule_ids(), vec!["CD0050"]);
    let Issue::FlowChartOrder { found, .. } = &report.issues[0] else {
        panic!("expected a flow-chart order issue");
    };
    assert_eq!(found.first().map(String::as_str), Some("ethnicity"));
}

#[test]
fn failed_declarations_are_registry_errors() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    fs::remove_file(dir.path().join("opensafely-dementia.csv")).unwrap();

    let load = collect_registry(dir.path(), &study_codelists());
    let report = validate_registry(&load);
    assert_eq!(report.rule_ids(), vec!["CD0005"]);
    assert_eq!(report.issues[0].subject(), Some("dementia"));
    assert!(report.has_errors());
}

#[test]
fn identical_codes_across_systems_warn() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut load = collect_registry(dir.path(), &study_codelists());
    assert!(load.is_complete());
    let copied = Codelist::new(CodingSystem::Snomed, ["U071", "U072"]).unwrap();
    load.registry
        .register("covid_snomed_copy", copied, "test")
        .unwrap();

    let report = validate_registry(&load);
    assert_eq!(report.rule_ids(), vec!["CD0004"]);
    assert!(!report.has_errors());
    assert!(report.issues[0].message().contains("covid_codelist (icd10)"));
}
