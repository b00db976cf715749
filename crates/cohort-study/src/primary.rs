//! Primary analysis definition.
//!
//! Subjects aged 0 to 105 and registered at the index date, with outcomes,
//! geography, demographics, clinical measurements and comorbidities.

use cohort_model::patients::{
    self, AddressField, EventsQuery, HouseholdField, PracticeField, TestResult,
};
use cohort_model::{
    DateFormat, DatePrecision, Distribution, Expectations, InWindow, Rate, Result,
    StudyDefinition, WithExpectations, filter_codes_by_category,
};

use crate::common::{INDEX_DATE, default_expectations, stp};
use crate::error::StudyError;

/// Name the primary definition is known by.
pub const PRIMARY_STUDY: &str = "primary";

/// First record on or before the day before the index date, month precision.
fn first_date_before_index(codelist: &str) -> Result<EventsQuery> {
    Ok(patients::with_these_clinical_events(codelist)
        .return_first_date_in_period()
        .on_or_before("index_date - 1 day")?
        .include_month())
}

/// Latest record on or before the day before the index date, month precision.
fn last_date_before_index(codelist: &str) -> Result<EventsQuery> {
    Ok(patients::with_these_clinical_events(codelist)
        .return_last_date_in_period()
        .on_or_before("index_date - 1 day")?
        .include_month())
}

/// Latest record between `lookback` and the index date, month precision.
fn last_date_in_past(codelist: &str, lookback: &str) -> Result<EventsQuery> {
    Ok(patients::with_these_clinical_events(codelist)
        .return_last_date_in_period()
        .between(lookback, "index_date")?
        .include_month())
}

fn normal(mean: f64, stddev: f64) -> Distribution {
    Distribution::Normal { mean, stddev }
}

fn from_index_date() -> Result<Expectations> {
    Expectations::new().earliest("index_date")
}

/// Last numeric value in a lookback window, without the match date.
fn last_value_between(
    codelist: &str,
    start: &str,
    end: &str,
    mean: f64,
    stddev: f64,
) -> Result<EventsQuery> {
    Ok(patients::with_these_clinical_events(codelist)
        .find_last_match_in_period()
        .between(start, end)?
        .returning_numeric_value()
        .include_date_of_match(false)
        .return_expectations(
            Expectations::new()
                .float(normal(mean, stddev))
                .incidence(0.95),
        ))
}

fn blood_pressure(codelist: &str, mean: f64) -> Result<patients::MeanValueQuery> {
    Ok(patients::mean_recorded_value(codelist)
        .on_most_recent_day_of_measurement(true)
        .on_or_before("index_date - 14 days")?
        .include_measurement_date(true)
        .include_month()
        .return_expectations(
            Expectations::new()
                .float(normal(mean, 10.0))
                .latest("index_date - 14 days")?
                .incidence(0.95),
        ))
}

fn ethnicity(codelist: &str) -> Result<EventsQuery> {
    Ok(patients::with_these_clinical_events(codelist)
        .returning_category()
        .find_last_match_in_period()
        .on_or_before("index_date")?
        .include_date_of_match(true)
        .return_expectations(
            Expectations::new()
                .category_ratios(&[("1", 0.8), ("5", 0.1), ("3", 0.1)])
                .incidence(0.75),
        ))
}

fn smoking_status() -> Result<cohort_model::Categorisation> {
    Ok(patients::categorised_as(&[
        (
            "S",
            "most_recent_smoking_code = 'S' OR smoked_last_18_months",
        ),
        (
            "E",
            "(most_recent_smoking_code = 'E' OR (
               most_recent_smoking_code = 'N' AND ever_smoked
             )
             ) AND NOT smoked_last_18_months",
        ),
        (
            "N",
            "most_recent_smoking_code = 'N' AND NOT ever_smoked",
        ),
        ("M", "DEFAULT"),
    ])?
    .return_expectations(
        Expectations::new().category_ratios(&[("S", 0.6), ("E", 0.1), ("N", 0.2), ("M", 0.1)]),
    )
    .with_sub_variable(
        "most_recent_smoking_code",
        patients::with_these_clinical_events("clear_smoking_codes")
            .find_last_match_in_period()
            .on_or_before("index_date")?
            .returning_category(),
    )
    .with_sub_variable(
        "ever_smoked",
        patients::with_these_clinical_events(filter_codes_by_category(
            "clear_smoking_codes",
            &["S", "E"],
        ))
        .on_or_before("index_date")?,
    )
    .with_sub_variable(
        "smoked_last_18_months",
        patients::with_these_clinical_events(filter_codes_by_category(
            "clear_smoking_codes",
            &["S"],
        ))
        .between("index_date - 18 months", "index_date")?,
    ))
}

fn asthma_severity() -> Result<cohort_model::Categorisation> {
    Ok(patients::categorised_as(&[
        ("0", "DEFAULT"),
        (
            "1",
            "(
               recent_asthma_code OR (
                 asthma_code_ever AND NOT
                 copd_code_ever
               )
             ) AND (
               prednisolone_last_year < 2
             )",
        ),
        (
            "2",
            "(
               recent_asthma_code OR (
                 asthma_code_ever AND NOT
                 copd_code_ever
               )
             ) AND
             prednisolone_last_year >= 2",
        ),
    ])?
    .return_expectations(
        Expectations::new().category_ratios(&[("0", 0.8), ("1", 0.1), ("2", 0.1)]),
    )
    .with_sub_variable(
        "recent_asthma_code",
        patients::with_these_clinical_events("asthma_codes")
            .between("index_date - 3 years", "index_date")?,
    )
    .with_sub_variable(
        "asthma_code_ever",
        patients::with_these_clinical_events("asthma_codes").on_or_before("index_date")?,
    )
    .with_sub_variable(
        "copd_code_ever",
        patients::with_these_clinical_events("other_respiratory_codes")
            .on_or_before("index_date")?,
    )
    .with_sub_variable(
        "prednisolone_last_year",
        patients::with_these_medications("pred_codes")
            .between("index_date - 1 year", "index_date")?
            .returning_number_of_matches(),
    ))
}

fn build() -> Result<StudyDefinition> {
    StudyDefinition::builder(PRIMARY_STUDY, INDEX_DATE)
        .default_expectations(default_expectations()?)
        .population(
            patients::satisfying(
                "(age >= 0 AND age <= 105)
                 AND alive_at_cohort_start",
            )?
            .with_sub_variable(
                "alive_at_cohort_start",
                patients::registered_with_one_practice_between("index_date - 1 day", "index_date")?,
            ),
        )
        // Outcomes
        .variable(
            "died_ons_covid_flag_any",
            patients::with_these_codes_on_death_certificate("covid_codelist")
                .on_or_after("index_date")?
                .match_only_underlying_cause(false)
                .return_expectations(from_index_date()?),
        )
        .variable(
            "died_date_ons",
            patients::died_from_any_cause()
                .returning_date_of_death()
                .include_month()
                .include_day()
                .return_expectations(from_index_date()?),
        )
        .variable(
            "covid_admission_date",
            patients::admitted_to_hospital()
                .returning_date_admitted()
                .with_these_diagnoses("covid_codelist")
                .on_or_after("index_date")?
                .find_first_match_in_period()
                .date_format(DateFormat::YearMonthDay)
                .return_expectations(from_index_date()?),
        )
        .variable(
            "sgss_first_positive_test_date",
            patients::with_test_result_in_sgss("SARS-CoV-2", TestResult::Positive)
                .find_first_match_in_period()
                .returning_date()
                .date_format(DateFormat::YearMonthDay)
                .return_expectations(from_index_date()?),
        )
        .variable(
            "covid_positive_test",
            patients::with_these_clinical_events("covid_positive_test_codes")
                .returning_category()
                .find_first_match_in_period()
                .include_date_of_match(true)
                .date_format(DateFormat::YearMonthDay)
                .return_expectations(
                    from_index_date()?.category_ratios(&[("XaLTE", 0.5), ("Y20d1", 0.5)]),
                ),
        )
        // Geography and deprivation
        .variable(
            "rural_urban",
            patients::address_as_of("index_date", AddressField::RuralUrbanClassification)?
                .return_expectations(Expectations::new().rate(Rate::Universal).category_ratios(
                    &[
                        ("0", 0.025),
                        ("1", 0.2),
                        ("2", 0.05),
                        ("3", 0.5),
                        ("4", 0.05),
                        ("5", 0.1),
                        ("6", 0.025),
                        ("7", 0.025),
                        ("8", 0.025),
                    ],
                )),
        )
        .variable("stp", stp(None)?)
        .variable(
            "region",
            patients::registered_practice_as_of("index_date", PracticeField::Nuts1RegionName)?
                .return_expectations(Expectations::new().rate(Rate::Universal).category_ratios(
                    &[
                        ("North East", 0.1),
                        ("North West", 0.1),
                        ("Yorkshire and The Humber", 0.1),
                        ("East Midlands", 0.2),
                        ("West Midlands", 0.1),
                        ("East", 0.1),
                        ("London", 0.2),
                        ("South East", 0.1),
                    ],
                )),
        )
        .variable(
            "imd",
            patients::address_as_of("index_date", AddressField::IndexOfMultipleDeprivation)?
                .round_to_nearest(100)
                .return_expectations(
                    Expectations::new()
                        .rate(Rate::Universal)
                        .category_ratios(&[("100", 0.1), ("200", 0.2), ("300", 0.7)]),
                ),
        )
        // Household, only available as of 1 Feb 2020
        .variable(
            "household_id",
            patients::household_as_of("2020-02-01", HouseholdField::PseudoId)?.return_expectations(
                Expectations::new()
                    .int(normal(1000.0, 200.0))
                    .incidence(1.0),
            ),
        )
        .variable(
            "household_size",
            patients::household_as_of("2020-02-01", HouseholdField::HouseholdSize)?
                .return_expectations(Expectations::new().int(normal(3.0, 1.0)).incidence(1.0)),
        )
        // Demographics
        .variable(
            "age",
            patients::age_as_of("index_date")?.return_expectations(
                Expectations::new()
                    .rate(Rate::Universal)
                    .int(Distribution::PopulationAges),
            ),
        )
        .variable(
            "sex",
            patients::sex().return_expectations(
                Expectations::new()
                    .rate(Rate::Universal)
                    .category_ratios(&[("M", 0.49), ("F", 0.51)]),
            ),
        )
        .variable("ethnicity", ethnicity("ethnicity_codes")?)
        .variable("ethnicity_16", ethnicity("ethnicity_codes_16")?)
        .variable("smoking_status", smoking_status()?)
        // Clinical measurements
        .variable(
            "bmi_adult",
            patients::most_recent_bmi()
                .on_or_before("index_date")?
                .minimum_age_at_measurement(16)
                .include_measurement_date(false)
                .return_expectations(Expectations::new().float(normal(35.0, 10.0)).incidence(0.95)),
        )
        .variable(
            "bmi_child",
            patients::most_recent_bmi()
                .on_or_before("index_date")?
                .minimum_age_at_measurement(0)
                .include_measurement_date(true)
                .include_month()
                .return_expectations(
                    Expectations::new()
                        .float(normal(35.0, 10.0))
                        .latest("index_date")?
                        .incidence(0.95),
                ),
        )
        .variable(
            "creatinine",
            last_value_between(
                "creatinine_codes",
                "index_date - 5 years",
                "index_date - 14 days",
                60.0,
                15.0,
            )?,
        )
        .variable("bp_sys", blood_pressure("systolic_blood_pressure_codes", 80.0)?)
        .variable("bp_dias", blood_pressure("diastolic_blood_pressure_codes", 120.0)?)
        .variable(
            "hba1c_mmol_per_mol",
            last_value_between(
                "hba1c_new_codes",
                "index_date - 15 months",
                "index_date",
                40.0,
                20.0,
            )?,
        )
        .variable(
            "hba1c_percentage",
            last_value_between("hba1c_old_codes", "index_date - 15 months", "index_date", 5.0, 2.0)?,
        )
        .variable("asthma_severity", asthma_severity()?)
        // Comorbidities
        .variable("cf", first_date_before_index("cf_codes")?)
        .variable("respiratory", first_date_before_index("other_respiratory_codes")?)
        .variable("cardiac", first_date_before_index("chronic_cardiac_disease_codes")?)
        .variable("af", first_date_before_index("af_codes")?)
        .variable("dvt_pe", first_date_before_index("dvt_pe_codes")?)
        .variable("pad_surg", first_date_before_index("pad_surg_codes")?)
        .variable("amputate", first_date_before_index("amputate_codes")?)
        .variable("diabetes", first_date_before_index("diabetes_codes")?)
        .variable("hypertension", first_date_before_index("hypertension_codes")?)
        .variable("stroke", first_date_before_index("stroke")?)
        .variable("dementia", first_date_before_index("dementia")?)
        .variable("neuro", first_date_before_index("other_neuro")?)
        .variable("tia", first_date_before_index("tia")?)
        .variable("lung_cancer", first_date_before_index("lung_cancer_codes")?)
        .variable("haem_cancer", first_date_before_index("haem_cancer_codes")?)
        .variable("other_cancer", first_date_before_index("other_cancer_codes")?)
        .variable("transplant_kidney", last_date_before_index("transplant_kidney_codes")?)
        .variable("dialysis", last_date_before_index("dialysis_codes")?)
        .variable("liver", first_date_before_index("chronic_liver_disease_codes")?)
        .variable(
            "transplant_notkidney",
            patients::with_these_clinical_events("transplant_notkidney_codes")
                .return_first_date_in_period()
                .on_or_before("2020-02-29")?
                .include_month(),
        )
        .variable("dysplenia", first_date_before_index("spleen_codes")?)
        .variable("sickle_cell", first_date_before_index("sickle_cell_codes")?)
        .variable("hiv", first_date_before_index("hiv_codes")?)
        .variable("perm_immuno", first_date_before_index("permanent_immune_codes")?)
        .variable(
            "temp_immuno",
            last_date_in_past("temp_immune_codes", "index_date - 1 year")?,
        )
        .variable(
            "aplastic_anaemia",
            last_date_in_past("aplastic_codes", "index_date - 1 year")?,
        )
        .variable("autoimmune", first_date_before_index("ra_sle_psoriasis_codes")?)
        .variable("ibd", first_date_before_index("inflammatory_bowel_disease_codes")?)
        .variable("smi", first_date_before_index("smi_codes")?)
        .variable(
            "fracture",
            last_date_in_past("fracture_codes", "index_date - 2 years")?,
        )
        // Learning disability, Down's syndrome and cerebral palsy
        .variable("ldr", first_date_before_index("ldr_codes")?)
        .variable("ld_profound", first_date_before_index("ld_profound_codes")?)
        .variable("ds", first_date_before_index("ds_codes")?)
        .variable("cp", first_date_before_index("cp_codes")?)
        .build()
}

/// Build the primary analysis definition.
pub fn primary_definition() -> crate::Result<StudyDefinition> {
    build().map_err(|source| StudyError::Definition {
        study: PRIMARY_STUDY.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use cohort_expr::{Scope, Value};
    use cohort_model::{OutputShape, SelectionPolicy, VariableKind, Window};
    use std::collections::HashMap;

    use super::*;

    fn study() -> StudyDefinition {
        primary_definition().unwrap()
    }

    fn scope(values: &[(&str, Value)]) -> HashMap<String, Value> {
        values
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    fn categorisation<'a>(study: &'a StudyDefinition, name: &str) -> &'a cohort_model::Categorisation {
        study
            .variable(name)
            .and_then(|variable| variable.query.categorisation())
            .unwrap()
    }

    #[test]
    fn declares_every_variable_in_order() {
        let study = study();
        let names: Vec<&str> = study.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names.len(), 58);
        assert_eq!(&names[..5], &[
            "died_ons_covid_flag_any",
            "died_date_ons",
            "covid_admission_date",
            "sgss_first_positive_test_date",
            "covid_positive_test",
        ]);
        assert_eq!(names.last(), Some(&"cp"));
    }

    #[test]
    fn smoking_never_smoker_resolves_to_n() {
        let study = study();
        let smoking = categorisation(&study, "smoking_status");
        let subject = scope(&[
            ("most_recent_smoking_code", Value::from("N")),
            ("ever_smoked", Value::Bool(false)),
            ("smoked_last_18_months", Value::Bool(false)),
        ]);
        assert_eq!(smoking.evaluate(&subject as &dyn Scope).unwrap(), "N");
    }

    #[test]
    fn smoking_without_records_falls_back_to_missing() {
        let study = study();
        let smoking = categorisation(&study, "smoking_status");
        let subject = scope(&[
            ("most_recent_smoking_code", Value::Missing),
            ("ever_smoked", Value::Bool(false)),
            ("smoked_last_18_months", Value::Bool(false)),
        ]);
        assert_eq!(smoking.evaluate(&subject as &dyn Scope).unwrap(), "M");
        assert_eq!(smoking.default_label(), "M");
    }

    #[test]
    fn recent_smoking_overrides_an_ex_smoker_code() {
        let study = study();
        let smoking = categorisation(&study, "smoking_status");
        let subject = scope(&[
            ("most_recent_smoking_code", Value::from("E")),
            ("ever_smoked", Value::Bool(true)),
            ("smoked_last_18_months", Value::Bool(true)),
        ]);
        assert_eq!(smoking.evaluate(&subject as &dyn Scope).unwrap(), "S");
    }

    #[test]
    fn asthma_severity_counts_prednisolone_courses() {
        let study = study();
        let asthma = categorisation(&study, "asthma_severity");
        let base = [
            ("recent_asthma_code", Value::Bool(true)),
            ("asthma_code_ever", Value::Bool(true)),
            ("copd_code_ever", Value::Bool(false)),
        ];
        let mut subject = scope(&base);
        subject.insert("prednisolone_last_year".to_string(), Value::Int(3));
        assert_eq!(asthma.evaluate(&subject as &dyn Scope).unwrap(), "2");
        subject.insert("prednisolone_last_year".to_string(), Value::Int(0));
        assert_eq!(asthma.evaluate(&subject as &dyn Scope).unwrap(), "1");
        subject.insert("recent_asthma_code".to_string(), Value::Bool(false));
        subject.insert("asthma_code_ever".to_string(), Value::Bool(false));
        assert_eq!(asthma.evaluate(&subject as &dyn Scope).unwrap(), "0");
    }

    #[test]
    fn creatinine_excludes_the_last_fortnight() {
        let study = study();
        let creatinine = study.variable("creatinine").unwrap();
        assert_eq!(
            creatinine.window(),
            Window::between("index_date - 5 years", "index_date - 14 days").unwrap()
        );
        assert_eq!(creatinine.shape(), OutputShape::Numeric);
        assert_eq!(creatinine.selection(), Some(SelectionPolicy::LastMatch));
    }

    #[test]
    fn blood_pressure_is_a_mean_aggregate() {
        let study = study();
        let bp = study.variable("bp_sys").unwrap();
        assert_eq!(bp.kind(), VariableKind::Aggregate);
        assert_eq!(bp.selection(), Some(SelectionPolicy::Mean));
    }

    #[test]
    fn population_is_not_referenced_by_any_rule() {
        let study = study();
        for rule in study.rules() {
            assert!(
                !rule.variable.external_references().contains("population"),
                "{} references the population",
                rule.path()
            );
        }
    }

    #[test]
    fn population_dependencies_are_evaluated_first() {
        let order = study().evaluation_order().unwrap();
        let rendered: Vec<String> = order.iter().map(ToString::to_string).collect();
        assert_eq!(
            &rendered[..3],
            &["age", "population.alive_at_cohort_start", "population"]
        );
    }
}
