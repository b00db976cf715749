//! Distributional hints attached to rules.
//!
//! Expectations only steer dummy-data generation in the extraction engine.
//! They never affect real extraction, but they are still checked for
//! internal consistency.

use serde::Serialize;

use crate::date::DateBound;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    Universal,
    Uniform,
    ExponentialIncrease,
}

impl Rate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rate::Universal => "universal",
            Rate::Uniform => "uniform",
            Rate::ExponentialIncrease => "exponential_increase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateBound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateBound>,
}

/// Numeric value distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, stddev: f64 },
    PopulationAges,
}

/// Ordered category labels with their expected share.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CategoryRatios(Vec<(String, f64)>);

impl CategoryRatios {
    pub fn new(ratios: &[(&str, f64)]) -> Self {
        Self(
            ratios
                .iter()
                .map(|(label, ratio)| ((*label).to_string(), *ratio))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(label, ratio)| (label.as_str(), *ratio))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(label, _)| label.as_str())
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().map(|(_, ratio)| ratio).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Expectations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRatios>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int: Option<Distribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float: Option<Distribution>,
}

impl Expectations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    #[must_use]
    pub fn incidence(mut self, incidence: f64) -> Self {
        self.incidence = Some(incidence);
        self
    }

    pub fn earliest(mut self, bound: &str) -> Result<Self> {
        let range = self.date.get_or_insert_with(DateRange::default);
        range.earliest = Some(bound.parse()?);
        Ok(self)
    }

    pub fn latest(mut self, bound: &str) -> Result<Self> {
        let range = self.date.get_or_insert_with(DateRange::default);
        range.latest = Some(bound.parse()?);
        Ok(self)
    }

    #[must_use]
    pub fn category_ratios(mut self, ratios: &[(&str, f64)]) -> Self {
        self.category = Some(CategoryRatios::new(ratios));
        self
    }

    #[must_use]
    pub fn int(mut self, distribution: Distribution) -> Self {
        self.int = Some(distribution);
        self
    }

    #[must_use]
    pub fn float(mut self, distribution: Distribution) -> Self {
        self.float = Some(distribution);
        self
    }

    /// Overlay these expectations on `defaults`, field by field.
    ///
    /// Date bounds merge individually, so a rule that only sets `earliest`
    /// keeps the default `latest`.
    pub fn merged_over(&self, defaults: &Expectations) -> Expectations {
        let date = match (self.date, defaults.date) {
            (Some(own), Some(default)) => Some(DateRange {
                earliest: own.earliest.or(default.earliest),
                latest: own.latest.or(default.latest),
            }),
            (own, default) => own.or(default),
        };
        Expectations {
            rate: self.rate.or(defaults.rate),
            incidence: self.incidence.or(defaults.incidence),
            date,
            category: self.category.clone().or_else(|| defaults.category.clone()),
            int: self.int.or(defaults.int),
            float: self.float.or(defaults.float),
        }
    }
}
