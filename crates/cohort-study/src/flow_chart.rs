//! Flow-chart definition used for attrition reporting.
//!
//! Starts from every subject. Each variable, in order, narrows the cohort
//! to those with a usable value, so the declared order is the attrition
//! sequence and must not change.

use cohort_model::patients::{self, AddressField};
use cohort_model::{
    DatePrecision, Distribution, Expectations, InWindow, Population, Rate, StudyDefinition,
    WithExpectations,
};

use crate::common::{INDEX_DATE, default_expectations, stp};
use crate::error::{Result, StudyError};

/// Name the flow-chart definition is known by.
pub const FLOW_CHART_STUDY: &str = "flow-chart";

/// Variables of the flow-chart definition, in attrition order.
pub const ATTRITION_SEQUENCE: [&str; 7] = [
    "alive_at_cohort_start",
    "died_date_ons",
    "stp",
    "imd",
    "age",
    "sex",
    "ethnicity",
];

fn build() -> cohort_model::Result<StudyDefinition> {
    StudyDefinition::builder(FLOW_CHART_STUDY, INDEX_DATE)
        .default_expectations(default_expectations()?)
        .population(patients::all())
        // Include: registered at the index date
        .variable(
            "alive_at_cohort_start",
            patients::registered_with_one_practice_between("index_date - 1 day", "index_date")?
                .return_expectations(Expectations::new().incidence(0.9)),
        )
        // Exclude: died before the index date (late de-registrations)
        .variable(
            "died_date_ons",
            patients::died_from_any_cause()
                .returning_date_of_death()
                .include_month()
                .include_day()
                .return_expectations(Expectations::new().earliest("index_date")?),
        )
        // Exclude: missing STP
        .variable("stp", stp(Some(0.9))?)
        // Exclude: missing IMD
        .variable(
            "imd",
            patients::address_as_of("index_date", AddressField::IndexOfMultipleDeprivation)?
                .round_to_nearest(100)
                .return_expectations(
                    Expectations::new()
                        .rate(Rate::Universal)
                        .category_ratios(&[
                            ("100", 0.2),
                            ("200", 0.2),
                            ("300", 0.2),
                            ("400", 0.2),
                            ("500", 0.2),
                        ])
                        .incidence(0.9),
                ),
        )
        // Exclude: age outside 0 to 105
        .variable(
            "age",
            patients::age_as_of("index_date")?.return_expectations(
                Expectations::new()
                    .rate(Rate::Universal)
                    .int(Distribution::PopulationAges)
                    .incidence(0.99),
            ),
        )
        // Exclude: missing sex
        .variable(
            "sex",
            patients::sex().return_expectations(
                Expectations::new()
                    .rate(Rate::Universal)
                    .category_ratios(&[("M", 0.49), ("F", 0.51)])
                    .incidence(0.98),
            ),
        )
        // Complete-case analysis: exclude missing ethnicity
        .variable(
            "ethnicity",
            patients::with_these_clinical_events("ethnicity_codes")
                .returning_category()
                .find_last_match_in_period()
                .on_or_before("index_date")?
                .include_date_of_match(true)
                .return_expectations(
                    Expectations::new()
                        .category_ratios(&[
                            ("1", 0.2),
                            ("2", 0.2),
                            ("3", 0.2),
                            ("4", 0.2),
                            ("5", 0.2),
                        ])
                        .incidence(0.75),
                ),
        )
        .build()
}

/// Build the flow-chart definition and check its attrition order.
pub fn flow_chart_definition() -> Result<StudyDefinition> {
    let study = build().map_err(|source| StudyError::Definition {
        study: FLOW_CHART_STUDY.to_string(),
        source,
    })?;
    check_sequence(&study)?;
    Ok(study)
}

/// Reject a flow chart whose population is filtered or whose variables
/// differ from [`ATTRITION_SEQUENCE`].
pub fn check_sequence(study: &StudyDefinition) -> Result<()> {
    if *study.population() != Population::All {
        return Err(StudyError::FlowChartPopulation);
    }
    let found: Vec<&str> = study.variables().iter().map(|v| v.name.as_str()).collect();
    if found != ATTRITION_SEQUENCE {
        return Err(StudyError::FlowChartOrder {
            expected: ATTRITION_SEQUENCE.iter().map(|name| (*name).to_string()).collect(),
            found: found.into_iter().map(str::to_string).collect(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cohort_model::{Query, Window};

    use super::*;

    fn query(study: &StudyDefinition, name: &str) -> Query {
        study.variable(name).unwrap().query.clone()
    }

    #[test]
    fn declared_order_is_the_attrition_sequence() {
        let study = flow_chart_definition().unwrap();
        assert_eq!(*study.population(), Population::All);
        assert!(check_sequence(&study).is_ok());
    }

    #[test]
    fn reordering_is_rejected() {
        let study = flow_chart_definition().unwrap();
        let mut builder = StudyDefinition::builder(FLOW_CHART_STUDY, INDEX_DATE)
            .population(patients::all());
        for name in ["alive_at_cohort_start", "died_date_ons", "imd", "stp", "age", "sex", "ethnicity"] {
            builder = builder.variable(name, query(&study, name));
        }
        let reordered = builder.build().unwrap();
        let err = check_sequence(&reordered).unwrap_err();
        assert!(matches!(err, StudyError::FlowChartOrder { .. }));
    }

    #[test]
    fn dropping_a_step_is_rejected() {
        let study = flow_chart_definition().unwrap();
        let mut builder = StudyDefinition::builder(FLOW_CHART_STUDY, INDEX_DATE)
            .population(patients::all());
        for name in ATTRITION_SEQUENCE.iter().filter(|name| **name != "sex") {
            builder = builder.variable(name, query(&study, name));
        }
        assert!(check_sequence(&builder.build().unwrap()).is_err());
    }

    #[test]
    fn filtered_population_is_rejected() {
        let study = flow_chart_definition().unwrap();
        let mut builder = StudyDefinition::builder(FLOW_CHART_STUDY, INDEX_DATE).population(
            patients::satisfying("alive_at_cohort_start").unwrap(),
        );
        for name in ATTRITION_SEQUENCE {
            builder = builder.variable(name, query(&study, name));
        }
        let err = check_sequence(&builder.build().unwrap()).unwrap_err();
        assert!(matches!(err, StudyError::FlowChartPopulation));
    }

    #[test]
    fn registration_window_is_the_day_before_index() {
        let study = flow_chart_definition().unwrap();
        let Query::Registered(registered) = query(&study, "alive_at_cohort_start") else {
            panic!("alive_at_cohort_start is not a registration rule");
        };
        let window = Window::Between(registered.start, registered.end);
        let resolved = window.resolve(study.index_date()).unwrap();
        assert_eq!(resolved.start, chrono::NaiveDate::from_ymd_opt(2020, 2, 29));
        assert_eq!(resolved.end, chrono::NaiveDate::from_ymd_opt(2020, 3, 1));
    }
}
