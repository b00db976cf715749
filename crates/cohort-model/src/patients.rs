//! Builders for the rule primitives.
//!
//! Each function here starts one rule; fluent methods fill in the window,
//! selection and output details. Methods that take date strings parse
//! them immediately and return `Result`, so a definition with a malformed
//! date fails where it is written.

use serde::Serialize;

use crate::categorise::Categorisation;
use crate::codelist::CodelistRef;
use crate::date::{DateExpr, DateFormat};
use crate::error::Result;
use crate::expectations::Expectations;
use crate::query::{Returning, Selection};
use crate::study::{Population, PredicateFilter};
use crate::window::Window;

/// Rules restricted to a temporal window.
pub trait InWindow: Sized {
    fn window_mut(&mut self) -> &mut Window;

    fn on_or_before(mut self, date: &str) -> Result<Self> {
        *self.window_mut() = Window::on_or_before(date)?;
        Ok(self)
    }

    fn on_or_after(mut self, date: &str) -> Result<Self> {
        *self.window_mut() = Window::on_or_after(date)?;
        Ok(self)
    }

    fn between(mut self, start: &str, end: &str) -> Result<Self> {
        *self.window_mut() = Window::between(start, end)?;
        Ok(self)
    }
}

/// Rules that emit a date column.
pub trait DatePrecision: Sized {
    fn date_format_mut(&mut self) -> &mut DateFormat;

    #[must_use]
    fn include_month(mut self) -> Self {
        let format = self.date_format_mut();
        if *format == DateFormat::Year {
            *format = DateFormat::YearMonth;
        }
        self
    }

    #[must_use]
    fn include_day(mut self) -> Self {
        *self.date_format_mut() = DateFormat::YearMonthDay;
        self
    }

    #[must_use]
    fn date_format(mut self, format: DateFormat) -> Self {
        *self.date_format_mut() = format;
        self
    }
}

/// Rules carrying synthetic expectations.
pub trait WithExpectations: Sized {
    fn expectations_mut(&mut self) -> &mut Expectations;

    #[must_use]
    fn return_expectations(mut self, expectations: Expectations) -> Self {
        *self.expectations_mut() = expectations;
        self
    }
}

macro_rules! impl_rule_traits {
    (window: $($ty:ty),*) => {
        $(impl InWindow for $ty {
            fn window_mut(&mut self) -> &mut Window {
                &mut self.window
            }
        })*
    };
    (date: $($ty:ty),*) => {
        $(impl DatePrecision for $ty {
            fn date_format_mut(&mut self) -> &mut DateFormat {
                &mut self.date_format
            }
        })*
    };
    (expectations: $($ty:ty),*) => {
        $(impl WithExpectations for $ty {
            fn expectations_mut(&mut self) -> &mut Expectations {
                &mut self.expectations
            }
        })*
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredQuery {
    pub start: DateExpr,
    pub end: DateExpr,
    pub expectations: Expectations,
}

/// Registered with a single practice for the whole of the period.
pub fn registered_with_one_practice_between(start: &str, end: &str) -> Result<RegisteredQuery> {
    Ok(RegisteredQuery {
        start: start.parse()?,
        end: end.parse()?,
        expectations: Expectations::default(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeathQuery {
    pub returning: Returning,
    pub window: Window,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl DeathQuery {
    #[must_use]
    pub fn returning_date_of_death(mut self) -> Self {
        self.returning = Returning::Date;
        self
    }
}

/// Death from any cause in the national death registry.
pub fn died_from_any_cause() -> DeathQuery {
    DeathQuery {
        returning: Returning::BinaryFlag,
        window: Window::Unbounded,
        date_format: DateFormat::default(),
        expectations: Expectations::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeathCertificateQuery {
    pub codelist: CodelistRef,
    pub window: Window,
    pub match_only_underlying_cause: bool,
    pub returning: Returning,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl DeathCertificateQuery {
    #[must_use]
    pub fn match_only_underlying_cause(mut self, underlying_only: bool) -> Self {
        self.match_only_underlying_cause = underlying_only;
        self
    }

    #[must_use]
    pub fn returning_date_of_death(mut self) -> Self {
        self.returning = Returning::Date;
        self
    }
}

/// Any of the codes recorded as a cause on the death certificate.
pub fn with_these_codes_on_death_certificate(
    codelist: impl Into<CodelistRef>,
) -> DeathCertificateQuery {
    DeathCertificateQuery {
        codelist: codelist.into(),
        window: Window::Unbounded,
        match_only_underlying_cause: false,
        returning: Returning::BinaryFlag,
        date_format: DateFormat::default(),
        expectations: Expectations::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionQuery {
    pub diagnoses: Option<CodelistRef>,
    pub window: Window,
    pub selection: Selection,
    pub returning: Returning,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl AdmissionQuery {
    #[must_use]
    pub fn with_these_diagnoses(mut self, codelist: impl Into<CodelistRef>) -> Self {
        self.diagnoses = Some(codelist.into());
        self
    }

    #[must_use]
    pub fn returning_date_admitted(mut self) -> Self {
        self.returning = Returning::Date;
        self
    }

    #[must_use]
    pub fn find_first_match_in_period(mut self) -> Self {
        self.selection = Selection::First;
        self
    }

    #[must_use]
    pub fn find_last_match_in_period(mut self) -> Self {
        self.selection = Selection::Last;
        self
    }
}

/// Hospital admissions, optionally restricted to primary diagnoses.
pub fn admitted_to_hospital() -> AdmissionQuery {
    AdmissionQuery {
        diagnoses: None,
        window: Window::Unbounded,
        selection: Selection::Any,
        returning: Returning::BinaryFlag,
        date_format: DateFormat::default(),
        expectations: Expectations::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Positive,
    Negative,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SgssQuery {
    pub pathogen: String,
    pub test_result: TestResult,
    pub window: Window,
    pub selection: Selection,
    pub returning: Returning,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl SgssQuery {
    #[must_use]
    pub fn returning_date(mut self) -> Self {
        self.returning = Returning::Date;
        self
    }

    #[must_use]
    pub fn find_first_match_in_period(mut self) -> Self {
        self.selection = Selection::First;
        self
    }

    #[must_use]
    pub fn find_last_match_in_period(mut self) -> Self {
        self.selection = Selection::Last;
        self
    }
}

/// Laboratory test results from the national surveillance system.
pub fn with_test_result_in_sgss(pathogen: &str, test_result: TestResult) -> SgssQuery {
    SgssQuery {
        pathogen: pathogen.to_string(),
        test_result,
        window: Window::Unbounded,
        selection: Selection::Any,
        returning: Returning::BinaryFlag,
        date_format: DateFormat::default(),
        expectations: Expectations::default(),
    }
}

/// Primary care table a coded-event query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    ClinicalEvents,
    Medications,
}

impl EventSource {
    pub fn primitive(&self) -> &'static str {
        match self {
            EventSource::ClinicalEvents => "with_these_clinical_events",
            EventSource::Medications => "with_these_medications",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventsQuery {
    pub source: EventSource,
    pub codelist: CodelistRef,
    pub window: Window,
    pub selection: Selection,
    pub returning: Returning,
    pub include_date_of_match: bool,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl EventsQuery {
    fn new(source: EventSource, codelist: CodelistRef) -> Self {
        Self {
            source,
            codelist,
            window: Window::Unbounded,
            selection: Selection::Any,
            returning: Returning::BinaryFlag,
            include_date_of_match: false,
            date_format: DateFormat::default(),
            expectations: Expectations::default(),
        }
    }

    #[must_use]
    pub fn find_first_match_in_period(mut self) -> Self {
        self.selection = Selection::First;
        self
    }

    #[must_use]
    pub fn find_last_match_in_period(mut self) -> Self {
        self.selection = Selection::Last;
        self
    }

    #[must_use]
    pub fn returning_category(mut self) -> Self {
        self.returning = Returning::Category;
        self
    }

    #[must_use]
    pub fn returning_numeric_value(mut self) -> Self {
        self.returning = Returning::NumericValue;
        self
    }

    #[must_use]
    pub fn returning_number_of_matches(mut self) -> Self {
        self.returning = Returning::NumberOfMatches;
        self
    }

    /// Date of the earliest matching record in the window.
    #[must_use]
    pub fn return_first_date_in_period(mut self) -> Self {
        self.returning = Returning::Date;
        self.selection = Selection::First;
        self
    }

    /// Date of the latest matching record in the window.
    #[must_use]
    pub fn return_last_date_in_period(mut self) -> Self {
        self.returning = Returning::Date;
        self.selection = Selection::Last;
        self
    }

    #[must_use]
    pub fn include_date_of_match(mut self, include: bool) -> Self {
        self.include_date_of_match = include;
        self
    }
}

pub fn with_these_clinical_events(codelist: impl Into<CodelistRef>) -> EventsQuery {
    EventsQuery::new(EventSource::ClinicalEvents, codelist.into())
}

pub fn with_these_medications(codelist: impl Into<CodelistRef>) -> EventsQuery {
    EventsQuery::new(EventSource::Medications, codelist.into())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BmiQuery {
    pub window: Window,
    pub minimum_age_at_measurement: u32,
    pub include_measurement_date: bool,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl BmiQuery {
    #[must_use]
    pub fn minimum_age_at_measurement(mut self, years: u32) -> Self {
        self.minimum_age_at_measurement = years;
        self
    }

    #[must_use]
    pub fn include_measurement_date(mut self, include: bool) -> Self {
        self.include_measurement_date = include;
        self
    }
}

/// Most recent body mass index, from a recorded value or height and weight.
pub fn most_recent_bmi() -> BmiQuery {
    BmiQuery {
        window: Window::Unbounded,
        minimum_age_at_measurement: 16,
        include_measurement_date: false,
        date_format: DateFormat::default(),
        expectations: Expectations::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanValueQuery {
    pub codelist: CodelistRef,
    pub window: Window,
    pub on_most_recent_day_of_measurement: bool,
    pub include_measurement_date: bool,
    pub date_format: DateFormat,
    pub expectations: Expectations,
}

impl MeanValueQuery {
    #[must_use]
    pub fn on_most_recent_day_of_measurement(mut self, most_recent_day: bool) -> Self {
        self.on_most_recent_day_of_measurement = most_recent_day;
        self
    }

    #[must_use]
    pub fn include_measurement_date(mut self, include: bool) -> Self {
        self.include_measurement_date = include;
        self
    }
}

/// Mean of recorded values, optionally on the most recent measurement day.
pub fn mean_recorded_value(codelist: impl Into<CodelistRef>) -> MeanValueQuery {
    MeanValueQuery {
        codelist: codelist.into(),
        window: Window::Unbounded,
        on_most_recent_day_of_measurement: false,
        include_measurement_date: false,
        date_format: DateFormat::default(),
        expectations: Expectations::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    IndexOfMultipleDeprivation,
    RuralUrbanClassification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressQuery {
    pub date: DateExpr,
    pub returning: AddressField,
    pub round_to_nearest: Option<u32>,
    pub expectations: Expectations,
}

impl AddressQuery {
    #[must_use]
    pub fn round_to_nearest(mut self, step: u32) -> Self {
        self.round_to_nearest = Some(step);
        self
    }
}

pub fn address_as_of(date: &str, returning: AddressField) -> Result<AddressQuery> {
    Ok(AddressQuery {
        date: date.parse()?,
        returning,
        round_to_nearest: None,
        expectations: Expectations::default(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeField {
    StpCode,
    Nuts1RegionName,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeQuery {
    pub date: DateExpr,
    pub returning: PracticeField,
    pub expectations: Expectations,
}

pub fn registered_practice_as_of(date: &str, returning: PracticeField) -> Result<PracticeQuery> {
    Ok(PracticeQuery {
        date: date.parse()?,
        returning,
        expectations: Expectations::default(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdField {
    PseudoId,
    HouseholdSize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdQuery {
    pub date: DateExpr,
    pub returning: HouseholdField,
    pub expectations: Expectations,
}

pub fn household_as_of(date: &str, returning: HouseholdField) -> Result<HouseholdQuery> {
    Ok(HouseholdQuery {
        date: date.parse()?,
        returning,
        expectations: Expectations::default(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeQuery {
    pub date: DateExpr,
    pub expectations: Expectations,
}

pub fn age_as_of(date: &str) -> Result<AgeQuery> {
    Ok(AgeQuery {
        date: date.parse()?,
        expectations: Expectations::default(),
    })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SexQuery {
    pub expectations: Expectations,
}

pub fn sex() -> SexQuery {
    SexQuery::default()
}

/// Ordered first-match categorisation; see [`Categorisation::new`].
pub fn categorised_as(categories: &[(&str, &str)]) -> Result<Categorisation> {
    Categorisation::new(categories)
}

/// Population restricted to subjects satisfying a condition.
pub fn satisfying(condition: &str) -> Result<PredicateFilter> {
    PredicateFilter::new(condition)
}

/// Population of every subject in the database.
pub fn all() -> Population {
    Population::All
}

impl_rule_traits!(window: DeathQuery, DeathCertificateQuery, AdmissionQuery, SgssQuery, EventsQuery, BmiQuery, MeanValueQuery);
impl_rule_traits!(date: DeathQuery, DeathCertificateQuery, AdmissionQuery, SgssQuery, EventsQuery, BmiQuery, MeanValueQuery);
impl_rule_traits!(expectations: RegisteredQuery, DeathQuery, DeathCertificateQuery, AdmissionQuery, SgssQuery, EventsQuery, BmiQuery, MeanValueQuery, AddressQuery, PracticeQuery, HouseholdQuery, AgeQuery, SexQuery);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{OutputShape, Query, SelectionPolicy, VariableKind};

    #[test]
    fn first_date_in_period_is_a_first_match_date() {
        let query: Query = with_these_clinical_events("cf_codes")
            .return_first_date_in_period()
            .on_or_before("index_date - 1 day")
            .unwrap()
            .include_month()
            .into();
        assert_eq!(query.shape(), OutputShape::Date);
        assert_eq!(query.selection(), Some(SelectionPolicy::FirstMatch));
        assert_eq!(query.date_format(), Some(DateFormat::YearMonth));
        assert_eq!(query.window().to_string(), "on or before index_date - 1 day");
    }

    #[test]
    fn number_of_matches_is_a_count_aggregate() {
        let query: Query = with_these_medications("pred_codes")
            .between("index_date - 1 year", "index_date")
            .unwrap()
            .returning_number_of_matches()
            .into();
        assert_eq!(query.kind(), VariableKind::Aggregate);
        assert_eq!(query.selection(), Some(SelectionPolicy::Count));
        assert_eq!(query.primitive(), "with_these_medications");
    }

    #[test]
    fn include_day_wins_over_include_month() {
        let query: Query = died_from_any_cause()
            .returning_date_of_death()
            .include_day()
            .include_month()
            .into();
        assert_eq!(query.date_format(), Some(DateFormat::YearMonthDay));
    }

    #[test]
    fn measurement_date_adds_secondary_column() {
        let query: Query = most_recent_bmi()
            .on_or_before("index_date")
            .unwrap()
            .minimum_age_at_measurement(0)
            .include_measurement_date(true)
            .include_month()
            .into();
        let secondary = query.secondary_column().unwrap();
        assert_eq!(secondary.suffix, "_date_measured");
        assert_eq!(secondary.format, DateFormat::YearMonth);
    }

    #[test]
    fn malformed_window_date_fails_at_declaration() {
        assert!(with_these_clinical_events("asthma_codes")
            .between("index_date - 3 yrs", "index_date")
            .is_err());
    }
}
