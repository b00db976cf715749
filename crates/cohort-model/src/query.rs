//! Rule primitives and their derived properties.
//!
//! Each [`Query`] variant corresponds to one retrieval primitive of the
//! extraction engine. The kind, output shape and selection policy of a
//! variable are derived from its query rather than declared separately, so
//! they can never disagree with the primitive's arguments.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use cohort_expr::Value;

use crate::categorise::Categorisation;
use crate::codelist::CodelistRef;
use crate::date::DateFormat;
use crate::expectations::Expectations;
use crate::patients::{
    AddressField, AddressQuery, AdmissionQuery, AgeQuery, BmiQuery, DeathCertificateQuery,
    DeathQuery, EventsQuery, HouseholdField, HouseholdQuery, MeanValueQuery, PracticeQuery,
    RegisteredQuery, SexQuery, SgssQuery,
};
use crate::window::Window;

/// Value a record-matching primitive returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Returning {
    #[default]
    BinaryFlag,
    Date,
    Category,
    NumericValue,
    NumberOfMatches,
}

/// Which matching record a lookup reads when several match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Any,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableKind {
    Lookup,
    Aggregate,
    DerivedCategory,
    PopulationFilter,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Lookup => "lookup",
            VariableKind::Aggregate => "aggregate",
            VariableKind::DerivedCategory => "derived-category",
            VariableKind::PopulationFilter => "population-filter",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    FirstMatch,
    LastMatch,
    AnyMatch,
    Mean,
    Count,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::FirstMatch => "first-match",
            SelectionPolicy::LastMatch => "last-match",
            SelectionPolicy::AnyMatch => "any-match",
            SelectionPolicy::Mean => "mean",
            SelectionPolicy::Count => "count",
        }
    }

    fn from_selection(selection: Selection) -> Self {
        match selection {
            Selection::Any => SelectionPolicy::AnyMatch,
            Selection::First => SelectionPolicy::FirstMatch,
            Selection::Last => SelectionPolicy::LastMatch,
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column type of a variable in the extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    Date,
    Numeric,
    Category,
    Boolean,
}

impl OutputShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputShape::Date => "date",
            OutputShape::Numeric => "numeric",
            OutputShape::Category => "category",
            OutputShape::Boolean => "boolean",
        }
    }

    fn from_returning(returning: Returning) -> Self {
        match returning {
            Returning::BinaryFlag => OutputShape::Boolean,
            Returning::Date => OutputShape::Date,
            Returning::Category => OutputShape::Category,
            Returning::NumericValue | Returning::NumberOfMatches => OutputShape::Numeric,
        }
    }

    /// Interpret a raw extract cell as a typed value.
    ///
    /// Empty cells are missing. Cells that do not parse at the declared
    /// shape are also missing.
    pub fn parse_value(&self, raw: &str, date_format: Option<DateFormat>) -> Value {
        let raw = raw.trim();
        if raw.is_empty() {
            return Value::Missing;
        }
        match self {
            OutputShape::Date => {
                let format = date_format.unwrap_or(DateFormat::YearMonthDay);
                format
                    .parse_value(raw)
                    .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
                    .map_or(Value::Missing, Value::Date)
            }
            OutputShape::Numeric => {
                if let Ok(value) = raw.parse::<i64>() {
                    Value::Int(value)
                } else {
                    raw.parse::<f64>().map_or(Value::Missing, Value::Float)
                }
            }
            OutputShape::Category => Value::Str(raw.to_string()),
            OutputShape::Boolean => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" => Value::Bool(true),
                "0" | "false" | "f" | "no" => Value::Bool(false),
                _ => Value::Missing,
            },
        }
    }
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additional date column emitted next to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryColumn {
    pub suffix: &'static str,
    pub format: DateFormat,
}

/// One retrieval or derivation rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum Query {
    #[serde(rename = "registered_with_one_practice_between")]
    Registered(RegisteredQuery),
    DiedFromAnyCause(DeathQuery),
    #[serde(rename = "with_these_codes_on_death_certificate")]
    DeathCertificate(DeathCertificateQuery),
    #[serde(rename = "admitted_to_hospital")]
    HospitalAdmission(AdmissionQuery),
    #[serde(rename = "with_test_result_in_sgss")]
    SgssTest(SgssQuery),
    #[serde(rename = "with_these_events")]
    Events(EventsQuery),
    MostRecentBmi(BmiQuery),
    MeanRecordedValue(MeanValueQuery),
    #[serde(rename = "address_as_of")]
    Address(AddressQuery),
    #[serde(rename = "registered_practice_as_of")]
    Practice(PracticeQuery),
    #[serde(rename = "household_as_of")]
    Household(HouseholdQuery),
    #[serde(rename = "age_as_of")]
    Age(AgeQuery),
    Sex(SexQuery),
    #[serde(rename = "categorised_as")]
    Categorised(Categorisation),
}

impl Query {
    /// Name of the engine primitive this query calls.
    pub fn primitive(&self) -> &'static str {
        match self {
            Query::Registered(_) => "registered_with_one_practice_between",
            Query::DiedFromAnyCause(_) => "died_from_any_cause",
            Query::DeathCertificate(_) => "with_these_codes_on_death_certificate",
            Query::HospitalAdmission(_) => "admitted_to_hospital",
            Query::SgssTest(_) => "with_test_result_in_sgss",
            Query::Events(query) => query.source.primitive(),
            Query::MostRecentBmi(_) => "most_recent_bmi",
            Query::MeanRecordedValue(_) => "mean_recorded_value",
            Query::Address(_) => "address_as_of",
            Query::Practice(_) => "registered_practice_as_of",
            Query::Household(_) => "household_as_of",
            Query::Age(_) => "age_as_of",
            Query::Sex(_) => "sex",
            Query::Categorised(_) => "categorised_as",
        }
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            Query::Events(query) if query.returning == Returning::NumberOfMatches => {
                VariableKind::Aggregate
            }
            Query::MeanRecordedValue(_) => VariableKind::Aggregate,
            Query::Categorised(_) => VariableKind::DerivedCategory,
            _ => VariableKind::Lookup,
        }
    }

    pub fn shape(&self) -> OutputShape {
        match self {
            Query::Registered(_) => OutputShape::Boolean,
            Query::DiedFromAnyCause(query) => OutputShape::from_returning(query.returning),
            Query::DeathCertificate(query) => OutputShape::from_returning(query.returning),
            Query::HospitalAdmission(query) => OutputShape::from_returning(query.returning),
            Query::SgssTest(query) => OutputShape::from_returning(query.returning),
            Query::Events(query) => OutputShape::from_returning(query.returning),
            Query::MostRecentBmi(_) | Query::MeanRecordedValue(_) => OutputShape::Numeric,
            Query::Address(query) => match query.returning {
                AddressField::IndexOfMultipleDeprivation => OutputShape::Numeric,
                AddressField::RuralUrbanClassification => OutputShape::Category,
            },
            Query::Practice(_) => OutputShape::Category,
            Query::Household(query) => match query.returning {
                HouseholdField::PseudoId | HouseholdField::HouseholdSize => OutputShape::Numeric,
            },
            Query::Age(_) => OutputShape::Numeric,
            Query::Sex(_) | Query::Categorised(_) => OutputShape::Category,
        }
    }

    /// Selection policy when several records match, for multi-record lookups.
    pub fn selection(&self) -> Option<SelectionPolicy> {
        match self {
            Query::DeathCertificate(_) => Some(SelectionPolicy::AnyMatch),
            Query::HospitalAdmission(query) => Some(SelectionPolicy::from_selection(query.selection)),
            Query::SgssTest(query) => Some(SelectionPolicy::from_selection(query.selection)),
            Query::Events(query) if query.returning == Returning::NumberOfMatches => {
                Some(SelectionPolicy::Count)
            }
            Query::Events(query) => Some(SelectionPolicy::from_selection(query.selection)),
            Query::MostRecentBmi(_) => Some(SelectionPolicy::LastMatch),
            Query::MeanRecordedValue(_) => Some(SelectionPolicy::Mean),
            Query::Categorised(_) => Some(SelectionPolicy::FirstMatch),
            Query::Registered(_)
            | Query::DiedFromAnyCause(_)
            | Query::Address(_)
            | Query::Practice(_)
            | Query::Household(_)
            | Query::Age(_)
            | Query::Sex(_) => None,
        }
    }

    /// Precision of the main column when it holds a date.
    pub fn date_format(&self) -> Option<DateFormat> {
        if self.shape() != OutputShape::Date {
            return None;
        }
        match self {
            Query::DiedFromAnyCause(query) => Some(query.date_format),
            Query::DeathCertificate(query) => Some(query.date_format),
            Query::HospitalAdmission(query) => Some(query.date_format),
            Query::SgssTest(query) => Some(query.date_format),
            Query::Events(query) => Some(query.date_format),
            _ => None,
        }
    }

    pub fn window(&self) -> Window {
        match self {
            Query::Registered(query) => Window::Between(query.start, query.end),
            Query::DiedFromAnyCause(query) => query.window,
            Query::DeathCertificate(query) => query.window,
            Query::HospitalAdmission(query) => query.window,
            Query::SgssTest(query) => query.window,
            Query::Events(query) => query.window,
            Query::MostRecentBmi(query) => query.window,
            Query::MeanRecordedValue(query) => query.window,
            Query::Address(query) => Window::AsOf(query.date),
            Query::Practice(query) => Window::AsOf(query.date),
            Query::Household(query) => Window::AsOf(query.date),
            Query::Age(query) => Window::AsOf(query.date),
            Query::Sex(_) | Query::Categorised(_) => Window::Unbounded,
        }
    }

    pub fn secondary_column(&self) -> Option<SecondaryColumn> {
        match self {
            Query::Events(query) if query.include_date_of_match => Some(SecondaryColumn {
                suffix: "_date",
                format: query.date_format,
            }),
            Query::MostRecentBmi(query) if query.include_measurement_date => {
                Some(SecondaryColumn {
                    suffix: "_date_measured",
                    format: query.date_format,
                })
            }
            Query::MeanRecordedValue(query) if query.include_measurement_date => {
                Some(SecondaryColumn {
                    suffix: "_date_measured",
                    format: query.date_format,
                })
            }
            _ => None,
        }
    }

    /// Codelists this query matches against directly.
    pub fn codelist_refs(&self) -> Vec<&CodelistRef> {
        match self {
            Query::DeathCertificate(query) => vec![&query.codelist],
            Query::HospitalAdmission(query) => query.diagnoses.iter().collect(),
            Query::Events(query) => vec![&query.codelist],
            Query::MeanRecordedValue(query) => vec![&query.codelist],
            _ => Vec::new(),
        }
    }

    pub fn expectations(&self) -> &Expectations {
        match self {
            Query::Registered(query) => &query.expectations,
            Query::DiedFromAnyCause(query) => &query.expectations,
            Query::DeathCertificate(query) => &query.expectations,
            Query::HospitalAdmission(query) => &query.expectations,
            Query::SgssTest(query) => &query.expectations,
            Query::Events(query) => &query.expectations,
            Query::MostRecentBmi(query) => &query.expectations,
            Query::MeanRecordedValue(query) => &query.expectations,
            Query::Address(query) => &query.expectations,
            Query::Practice(query) => &query.expectations,
            Query::Household(query) => &query.expectations,
            Query::Age(query) => &query.expectations,
            Query::Sex(query) => &query.expectations,
            Query::Categorised(categorisation) => categorisation.expectations(),
        }
    }

    pub fn categorisation(&self) -> Option<&Categorisation> {
        match self {
            Query::Categorised(categorisation) => Some(categorisation),
            _ => None,
        }
    }
}

macro_rules! impl_into_query {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Query {
                fn from(query: $ty) -> Self {
                    Query::$variant(query)
                }
            }
        )*
    };
}

impl_into_query! {
    RegisteredQuery => Registered,
    DeathQuery => DiedFromAnyCause,
    DeathCertificateQuery => DeathCertificate,
    AdmissionQuery => HospitalAdmission,
    SgssQuery => SgssTest,
    EventsQuery => Events,
    BmiQuery => MostRecentBmi,
    MeanValueQuery => MeanRecordedValue,
    AddressQuery => Address,
    PracticeQuery => Practice,
    HouseholdQuery => Household,
    AgeQuery => Age,
    SexQuery => Sex,
    Categorisation => Categorised,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_cells_accept_flag_spellings() {
        assert_eq!(OutputShape::Boolean.parse_value("1", None), Value::Bool(true));
        assert_eq!(OutputShape::Boolean.parse_value("0", None), Value::Bool(false));
        assert_eq!(OutputShape::Boolean.parse_value("", None), Value::Missing);
    }

    #[test]
    fn numeric_cells_prefer_integers() {
        assert_eq!(OutputShape::Numeric.parse_value("300", None), Value::Int(300));
        assert_eq!(OutputShape::Numeric.parse_value("35.5", None), Value::Float(35.5));
        assert_eq!(OutputShape::Numeric.parse_value("n/a", None), Value::Missing);
    }

    #[test]
    fn date_cells_use_declared_precision() {
        let value = OutputShape::Date.parse_value("2020-04", Some(DateFormat::YearMonth));
        assert_eq!(value, Value::Date(NaiveDate::from_ymd_opt(2020, 4, 1).unwrap()));
        let value = OutputShape::Date.parse_value("2020-04-02", Some(DateFormat::YearMonthDay));
        assert_eq!(value, Value::Date(NaiveDate::from_ymd_opt(2020, 4, 2).unwrap()));
    }
}
