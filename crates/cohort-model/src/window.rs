use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::date::DateExpr;
use crate::error::Result;

/// Temporal window a rule restricts matching records to.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    #[default]
    Unbounded,
    OnOrBefore(DateExpr),
    OnOrAfter(DateExpr),
    Between(DateExpr, DateExpr),
    /// State as of a single date.
    AsOf(DateExpr),
}

impl Window {
    pub fn between(start: &str, end: &str) -> Result<Self> {
        Ok(Window::Between(start.parse()?, end.parse()?))
    }

    pub fn on_or_before(date: &str) -> Result<Self> {
        Ok(Window::OnOrBefore(date.parse()?))
    }

    pub fn on_or_after(date: &str) -> Result<Self> {
        Ok(Window::OnOrAfter(date.parse()?))
    }

    pub fn as_of(date: &str) -> Result<Self> {
        Ok(Window::AsOf(date.parse()?))
    }

    /// Date expressions appearing in the window.
    pub fn dates(&self) -> Vec<DateExpr> {
        match *self {
            Window::Unbounded => Vec::new(),
            Window::OnOrBefore(date) | Window::OnOrAfter(date) | Window::AsOf(date) => vec![date],
            Window::Between(start, end) => vec![start, end],
        }
    }

    pub fn resolve(&self, index_date: NaiveDate) -> Result<ResolvedWindow> {
        let window = match *self {
            Window::Unbounded => ResolvedWindow::default(),
            Window::OnOrBefore(end) => ResolvedWindow {
                start: None,
                end: Some(end.resolve(index_date)?),
            },
            Window::OnOrAfter(start) => ResolvedWindow {
                start: Some(start.resolve(index_date)?),
                end: None,
            },
            Window::Between(start, end) => ResolvedWindow {
                start: Some(start.resolve(index_date)?),
                end: Some(end.resolve(index_date)?),
            },
            Window::AsOf(date) => {
                let date = date.resolve(index_date)?;
                ResolvedWindow {
                    start: Some(date),
                    end: Some(date),
                }
            }
        };
        Ok(window)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Unbounded => f.write_str("any time"),
            Window::OnOrBefore(date) => write!(f, "on or before {date}"),
            Window::OnOrAfter(date) => write!(f, "on or after {date}"),
            Window::Between(start, end) => write!(f, "between {start} and {end}"),
            Window::AsOf(date) => write!(f, "as of {date}"),
        }
    }
}

/// Window with the index date substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ResolvedWindow {
    /// Lower bound does not exceed the upper bound.
    pub fn is_ordered(&self) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| start <= date) && self.end.is_none_or(|end| date <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
    }

    #[test]
    fn between_bounds_are_inclusive() {
        let window = Window::between("index_date - 18 months", "index_date").unwrap();
        let resolved = window.resolve(index()).unwrap();
        assert!(resolved.is_ordered());
        assert!(resolved.contains(NaiveDate::from_ymd_opt(2018, 9, 1).unwrap()));
        assert!(resolved.contains(index()));
        assert!(!resolved.contains(NaiveDate::from_ymd_opt(2020, 3, 2).unwrap()));
    }

    #[test]
    fn inverted_window_is_detected() {
        let window = Window::between("index_date", "index_date - 14 days").unwrap();
        assert!(!window.resolve(index()).unwrap().is_ordered());
    }

    #[test]
    fn open_windows_are_ordered() {
        let window = Window::on_or_before("index_date - 1 day").unwrap();
        let resolved = window.resolve(index()).unwrap();
        assert_eq!(resolved.end, NaiveDate::from_ymd_opt(2020, 2, 29));
        assert!(resolved.is_ordered());
        assert_eq!(window.to_string(), "on or before index_date - 1 day");
    }
}
