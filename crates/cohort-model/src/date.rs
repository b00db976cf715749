//! Date expressions relative to the study index date.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, Result};

const INDEX_DATE: &str = "index_date";
const TODAY: &str = "today";

/// Calendar unit of an offset from the index date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateUnit {
    Day,
    Month,
    Year,
}

impl DateUnit {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "day" | "days" => Some(DateUnit::Day),
            "month" | "months" => Some(DateUnit::Month),
            "year" | "years" => Some(DateUnit::Year),
            _ => None,
        }
    }

    fn label(&self, amount: u32) -> &'static str {
        match (self, amount == 1) {
            (DateUnit::Day, true) => "day",
            (DateUnit::Day, false) => "days",
            (DateUnit::Month, true) => "month",
            (DateUnit::Month, false) => "months",
            (DateUnit::Year, true) => "year",
            (DateUnit::Year, false) => "years",
        }
    }
}

/// A date written as `index_date`, `index_date - N unit` or a fixed ISO date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateExpr {
    IndexDate { offset: i64, unit: DateUnit },
    Fixed(NaiveDate),
}

impl DateExpr {
    pub fn index_date() -> Self {
        DateExpr::IndexDate {
            offset: 0,
            unit: DateUnit::Day,
        }
    }

    /// Substitute the index date and apply the offset.
    ///
    /// Month and year offsets clamp to the end of the target month.
    pub fn resolve(&self, index_date: NaiveDate) -> Result<NaiveDate> {
        let (offset, unit) = match *self {
            DateExpr::Fixed(date) => return Ok(date),
            DateExpr::IndexDate { offset, unit } => (offset, unit),
        };
        let magnitude = offset.unsigned_abs();
        let resolved = match unit {
            DateUnit::Day => {
                let days = Days::new(magnitude);
                if offset < 0 {
                    index_date.checked_sub_days(days)
                } else {
                    index_date.checked_add_days(days)
                }
            }
            DateUnit::Month | DateUnit::Year => {
                let months = if unit == DateUnit::Year {
                    magnitude.checked_mul(12)
                } else {
                    Some(magnitude)
                };
                months
                    .and_then(|m| u32::try_from(m).ok())
                    .map(Months::new)
                    .and_then(|months| {
                        if offset < 0 {
                            index_date.checked_sub_months(months)
                        } else {
                            index_date.checked_add_months(months)
                        }
                    })
            }
        };
        resolved.ok_or_else(|| ModelError::DateOutOfRange {
            expr: self.to_string(),
        })
    }
}

impl FromStr for DateExpr {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ModelError::InvalidDateExpr {
            input: s.to_string(),
        };
        let text = s.trim();
        let Some(rest) = text.strip_prefix(INDEX_DATE) else {
            return NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(DateExpr::Fixed)
                .map_err(|_| invalid());
        };
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(DateExpr::index_date());
        }
        let (sign, rest) = if let Some(rest) = rest.strip_prefix('-') {
            (-1, rest)
        } else if let Some(rest) = rest.strip_prefix('+') {
            (1, rest)
        } else {
            return Err(invalid());
        };
        let mut parts = rest.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let amount: i64 = amount.parse().map_err(|_| invalid())?;
        let unit = DateUnit::parse(unit).ok_or_else(invalid)?;
        if amount < 0 {
            return Err(invalid());
        }
        Ok(DateExpr::IndexDate {
            offset: sign * amount,
            unit,
        })
    }
}

impl fmt::Display for DateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateExpr::Fixed(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateExpr::IndexDate { offset: 0, .. } => f.write_str(INDEX_DATE),
            DateExpr::IndexDate { offset, unit } => {
                let sign = if *offset < 0 { '-' } else { '+' };
                let amount = offset.unsigned_abs();
                let label = unit.label(u32::try_from(amount).unwrap_or(u32::MAX));
                write!(f, "{INDEX_DATE} {sign} {amount} {label}")
            }
        }
    }
}

impl Serialize for DateExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Bound of an expectation date range, which may also be the run date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Date(DateExpr),
    Today,
}

impl DateBound {
    pub fn resolve(&self, index_date: NaiveDate, today: NaiveDate) -> Result<NaiveDate> {
        match self {
            DateBound::Date(expr) => expr.resolve(index_date),
            DateBound::Today => Ok(today),
        }
    }
}

impl FromStr for DateBound {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case(TODAY) {
            return Ok(DateBound::Today);
        }
        s.parse().map(DateBound::Date)
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Date(expr) => write!(f, "{expr}"),
            DateBound::Today => f.write_str(TODAY),
        }
    }
}

impl Serialize for DateBound {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Precision of a date column in the extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "YYYY")]
    Year,
    #[serde(rename = "YYYY-MM")]
    YearMonth,
    #[serde(rename = "YYYY-MM-DD")]
    YearMonthDay,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::Year => "YYYY",
            DateFormat::YearMonth => "YYYY-MM",
            DateFormat::YearMonthDay => "YYYY-MM-DD",
        }
    }

    /// Format implied by `include_month` / `include_day` flags.
    pub fn from_flags(include_month: bool, include_day: bool) -> Self {
        match (include_month, include_day) {
            (_, true) => DateFormat::YearMonthDay,
            (true, false) => DateFormat::YearMonth,
            (false, false) => DateFormat::Year,
        }
    }

    /// Parse an extract value written at this precision.
    ///
    /// Truncated dates resolve to the first day of the year or month.
    /// A value written at a finer precision is also accepted.
    pub fn parse_value(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        let mut parts = raw.split('-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month: u32 = match parts.next() {
            Some(month) => month.parse().ok()?,
            None if *self == DateFormat::Year => 1,
            None => return None,
        };
        let day: u32 = match parts.next() {
            Some(day) => day.parse().ok()?,
            None if *self != DateFormat::YearMonthDay => 1,
            None => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// Render a date at this precision.
    pub fn render(&self, date: NaiveDate) -> String {
        match self {
            DateFormat::Year => format!("{:04}", date.year()),
            DateFormat::YearMonth => format!("{:04}-{:02}", date.year(), date.month()),
            DateFormat::YearMonthDay => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YYYY" => Ok(DateFormat::Year),
            "YYYY-MM" => Ok(DateFormat::YearMonth),
            "YYYY-MM-DD" => Ok(DateFormat::YearMonthDay),
            _ => Err(ModelError::InvalidDateFormat {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_and_resolves_offsets() {
        let cases = [
            ("index_date", ymd(2020, 3, 1)),
            ("index_date - 1 day", ymd(2020, 2, 29)),
            ("index_date - 14 days", ymd(2020, 2, 16)),
            ("index_date - 18 months", ymd(2018, 9, 1)),
            ("index_date - 15 months", ymd(2018, 12, 1)),
            ("index_date - 5 years", ymd(2015, 3, 1)),
            ("index_date + 1 month", ymd(2020, 4, 1)),
            ("2020-02-01", ymd(2020, 2, 1)),
        ];
        for (raw, expected) in cases {
            let expr: DateExpr = raw.parse().unwrap();
            assert_eq!(expr.resolve(index()).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn display_matches_source_notation() {
        for raw in ["index_date", "index_date - 1 day", "index_date - 18 months", "2020-02-29"] {
            assert_eq!(raw.parse::<DateExpr>().unwrap().to_string(), raw);
        }
    }

    #[test]
    fn rejects_malformed_expressions() {
        for raw in ["", "index_date 1 day", "index_date - day", "index_date - 1 week", "2020-02-30"] {
            assert!(raw.parse::<DateExpr>().is_err(), "{raw}");
        }
    }

    #[test]
    fn month_offsets_clamp_to_month_end() {
        let expr: DateExpr = "index_date - 1 month".parse().unwrap();
        assert_eq!(expr.resolve(ymd(2020, 3, 31)).unwrap(), ymd(2020, 2, 29));
    }

    #[test]
    fn overflow_is_reported() {
        let expr = DateExpr::IndexDate {
            offset: i64::MAX,
            unit: DateUnit::Day,
        };
        assert!(matches!(
            expr.resolve(index()),
            Err(ModelError::DateOutOfRange { .. })
        ));
    }

    #[test]
    fn today_is_a_bound() {
        let bound: DateBound = "today".parse().unwrap();
        assert_eq!(bound, DateBound::Today);
        assert_eq!(bound.resolve(index(), ymd(2021, 1, 1)).unwrap(), ymd(2021, 1, 1));
    }

    #[test]
    fn partial_dates_parse_at_their_precision() {
        assert_eq!(DateFormat::Year.parse_value("2019"), Some(ymd(2019, 1, 1)));
        assert_eq!(DateFormat::YearMonth.parse_value("2019-07"), Some(ymd(2019, 7, 1)));
        assert_eq!(DateFormat::YearMonth.parse_value("2019"), None);
        assert_eq!(DateFormat::YearMonthDay.parse_value("2019-07-14"), Some(ymd(2019, 7, 14)));
        assert_eq!(DateFormat::YearMonthDay.parse_value(""), None);
        assert_eq!(DateFormat::YearMonth.render(ymd(2019, 7, 14)), "2019-07");
        assert_eq!(DateFormat::from_flags(true, false), DateFormat::YearMonth);
        assert_eq!(DateFormat::from_flags(true, true), DateFormat::YearMonthDay);
    }
}
