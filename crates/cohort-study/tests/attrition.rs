use std::io::Write;

use cohort_study::{Extract, StudyError, count_attrition, flow_chart_definition};
use tempfile::NamedTempFile;

const HEADER: &str = "patient_id,alive_at_cohort_start,died_date_ons,stp,imd,age,sex,ethnicity,ethnicity_date";

fn create_temp_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{content}").unwrap();
    file
}

fn extract_csv(rows: &[&str]) -> NamedTempFile {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    create_temp_csv(&content)
}

#[test]
fn each_step_excludes_its_own_failures() {
    let file = extract_csv(&[
        "1,1,,E54000005,300,40,M,1,2019",
        "2,0,,E54000005,300,40,F,1,",
        "3,1,2020-02-15,E54000005,300,40,F,1,",
        "4,1,2020-04-01,E54000005,300,50,F,3,2018",
        "5,1,,,300,40,M,1,",
        "6,1,,E54000006,0,40,M,1,",
        "7,1,,E54000006,100,110,M,1,",
        "8,1,,E54000006,100,30,,1,",
        "9,1,,E54000006,100,30,F,,",
        "10,1,,E54000006,100,30,F,0,",
    ]);
    let study = flow_chart_definition().unwrap();
    let extract = Extract::from_csv(file.path(), &study).unwrap();
    let table = count_attrition(&study, &extract).unwrap();

    assert_eq!(table.total, 10);
    let counts: Vec<(&str, usize, usize)> = table
        .steps
        .iter()
        .map(|step| (step.variable.as_str(), step.remaining, step.excluded))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("alive_at_cohort_start", 9, 1),
            ("died_date_ons", 8, 1),
            ("stp", 7, 1),
            ("imd", 6, 1),
            ("age", 5, 1),
            ("sex", 4, 1),
            ("ethnicity", 2, 2),
        ]
    );
    assert_eq!(table.final_count(), 2);
}

#[test]
fn empty_extract_counts_zero_everywhere() {
    let file = extract_csv(&[]);
    let study = flow_chart_definition().unwrap();
    let extract = Extract::from_csv(file.path(), &study).unwrap();
    let table = count_attrition(&study, &extract).unwrap();
    assert_eq!(table.total, 0);
    assert!(table.steps.iter().all(|step| step.remaining == 0));
}

#[test]
fn untyped_cell_is_reported_with_its_row() {
    let file = extract_csv(&["1,1,,E54000005,300,forty,M,1,"]);
    let study = flow_chart_definition().unwrap();
    let err = Extract::from_csv(file.path(), &study).unwrap_err();
    match err {
        StudyError::InvalidValue { row, column, .. } => {
            assert_eq!(row, 1);
            assert_eq!(column, "age");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_variable_column_is_reported() {
    let file = create_temp_csv("patient_id,alive_at_cohort_start,died_date_ons,stp,imd,age,ethnicity\n");
    let study = flow_chart_definition().unwrap();
    let err = Extract::from_csv(file.path(), &study).unwrap_err();
    assert!(matches!(err, StudyError::MissingColumn { column, .. } if column == "sex"));
}

#[test]
fn missing_extract_file_is_named_as_an_extract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.csv");
    let study = flow_chart_definition().unwrap();
    let err = Extract::from_csv(&path, &study).unwrap_err();
    assert!(matches!(&err, StudyError::MissingExtract { path: missing } if *missing == path));
    assert!(err.to_string().starts_with("extract file not found: "));
}
