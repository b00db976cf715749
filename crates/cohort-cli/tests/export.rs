use std::fs;

use cohort_cli::export::{build_export, write_export};
use cohort_codelists::CodelistRegistry;
use cohort_model::{Codelist, CodingSystem};
use cohort_study::flow_chart_definition;
use tempfile::TempDir;

fn ethnicity_registry() -> CodelistRegistry {
    let mut registry = CodelistRegistry::new();
    let ethnicity =
        Codelist::from_categorised_rows(CodingSystem::Ctv3, [("Y123", "3"), ("XaJQv", "1")])
            .unwrap();
    registry
        .register("ethnicity_codes", ethnicity, "opensafely-ethnicity.csv")
        .unwrap();
    registry
}

#[test]
fn flow_chart_export_carries_resolved_codelists() {
    let study = flow_chart_definition().unwrap();
    let registry = ethnicity_registry();
    let document = build_export(&study, &registry).unwrap();

    insta::assert_json_snapshot!(document.evaluation_order, @r#"
    [
      "population",
      "alive_at_cohort_start",
      "died_date_ons",
      "stp",
      "imd",
      "age",
      "sex",
      "ethnicity"
    ]
    "#);

    assert_eq!(document.codelists.len(), 1);
    let codelist = &document.codelists[0];
    assert_eq!(codelist.reference, "ethnicity_codes");
    assert_eq!(codelist.used_by, vec!["ethnicity".to_string()]);
    assert_eq!(codelist.fingerprint.len(), 64);
}

#[test]
fn missing_codelist_names_the_reference() {
    let study = flow_chart_definition().unwrap();
    let err = build_export(&study, &CodelistRegistry::new()).unwrap_err();
    assert!(
        format!("{err:#}").contains("resolve codelist ethnicity_codes for ethnicity"),
        "{err:#}"
    );
}

#[test]
fn export_file_is_pretty_json() {
    let study = flow_chart_definition().unwrap();
    let registry = ethnicity_registry();
    let document = build_export(&study, &registry).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow-chart.json");

    write_export(&document, Some(&path)).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["study"]["name"], "flow-chart");
    assert_eq!(json["study"]["population"]["kind"], "all");
    assert_eq!(json["output_columns"][0]["name"], "patient_id");
    assert_eq!(json["codelists"][0]["system"], "ctv3");
    assert_eq!(json["codelists"][0]["codes"], serde_json::json!(["XaJQv", "Y123"]));
}
