use std::collections::BTreeSet;

use cohort_codelists::study_codelists;
use cohort_study::{STUDY_NAMES, StudyError, all_definitions, definition, flow_chart_definition};

fn render_columns(name: &str) -> String {
    definition(name)
        .unwrap()
        .output_columns()
        .iter()
        .map(|column| match column.date_format {
            Some(format) => format!("{}: {} {}", column.name, column.shape, format),
            None => format!("{}: {}", column.name, column.shape),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn flow_chart_columns() {
    insta::assert_snapshot!(render_columns("flow-chart"), @r"
    patient_id: numeric
    alive_at_cohort_start: boolean
    died_date_ons: date YYYY-MM-DD
    stp: category
    imd: numeric
    age: numeric
    sex: category
    ethnicity: category
    ethnicity_date: date YYYY
    ");
}

#[test]
fn primary_leading_columns() {
    let rendered = render_columns("primary");
    let head: Vec<&str> = rendered.lines().take(8).collect();
    insta::assert_snapshot!(head.join("\n"), @r"
    patient_id: numeric
    died_ons_covid_flag_any: boolean
    died_date_ons: date YYYY-MM-DD
    covid_admission_date: date YYYY-MM-DD
    sgss_first_positive_test_date: date YYYY-MM-DD
    covid_positive_test: category
    covid_positive_test_date: date YYYY-MM-DD
    rural_urban: category
    ");
}

#[test]
fn every_codelist_reference_is_declared() {
    let declared: BTreeSet<String> = study_codelists().into_iter().map(|d| d.name).collect();
    for study in all_definitions().unwrap() {
        for usage in study.codelist_refs() {
            for name in usage.reference.names() {
                assert!(
                    declared.contains(name),
                    "{} in {} references undeclared codelist {name}",
                    usage.variable,
                    study.name()
                );
            }
        }
    }
}

#[test]
fn both_definitions_share_the_index_date() {
    let dates: BTreeSet<_> = all_definitions()
        .unwrap()
        .iter()
        .map(|study| study.index_date())
        .collect();
    assert_eq!(dates.len(), 1);
    assert_eq!(
        dates.into_iter().next(),
        chrono::NaiveDate::from_ymd_opt(2020, 3, 1)
    );
}

#[test]
fn unknown_study_names_list_the_known_ones() {
    let err = definition("secondary").unwrap_err();
    assert!(matches!(err, StudyError::UnknownStudy { ref known, .. } if known.len() == STUDY_NAMES.len()));
}

#[test]
fn definitions_serialise_to_json() {
    let study = flow_chart_definition().unwrap();
    let json = serde_json::to_value(&study).unwrap();
    assert_eq!(json["index_date"], "2020-03-01");
    assert_eq!(json["population"]["kind"], "all");
    assert_eq!(json["variables"].as_array().unwrap().len(), 7);
}
