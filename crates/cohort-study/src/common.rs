//! Pieces shared by both study definitions.

use cohort_model::patients::{self, PracticeField, PracticeQuery};
use cohort_model::{Expectations, Rate, Result, WithExpectations};

/// Index date of both definitions.
pub const INDEX_DATE: &str = "2020-03-01";

/// Sustainability and transformation partnership codes and their shares.
pub(crate) const STP_RATIOS: &[(&str, f64)] = &[
    ("E54000005", 0.04),
    ("E54000006", 0.04),
    ("E54000007", 0.04),
    ("E54000008", 0.04),
    ("E54000009", 0.04),
    ("E54000010", 0.04),
    ("E54000012", 0.04),
    ("E54000013", 0.03),
    ("E54000014", 0.03),
    ("E54000015", 0.03),
    ("E54000016", 0.03),
    ("E54000017", 0.03),
    ("E54000020", 0.03),
    ("E54000021", 0.03),
    ("E54000022", 0.03),
    ("E54000023", 0.03),
    ("E54000024", 0.03),
    ("E54000025", 0.03),
    ("E54000026", 0.03),
    ("E54000027", 0.03),
    ("E54000029", 0.03),
    ("E54000033", 0.03),
    ("E54000035", 0.03),
    ("E54000036", 0.03),
    ("E54000037", 0.03),
    ("E54000040", 0.03),
    ("E54000041", 0.03),
    ("E54000042", 0.03),
    ("E54000044", 0.03),
    ("E54000043", 0.03),
    ("E54000049", 0.03),
];

/// Dates from 1970 until today, uniform rate, 20% incidence.
pub(crate) fn default_expectations() -> Result<Expectations> {
    Ok(Expectations::new()
        .earliest("1970-01-01")?
        .latest("today")?
        .rate(Rate::Uniform)
        .incidence(0.2))
}

/// STP of the practice registered at the index date.
pub(crate) fn stp(incidence: Option<f64>) -> Result<PracticeQuery> {
    let mut expectations = Expectations::new()
        .rate(Rate::Universal)
        .category_ratios(STP_RATIOS);
    expectations.incidence = incidence;
    Ok(
        patients::registered_practice_as_of("index_date", PracticeField::StpCode)?
            .return_expectations(expectations),
    )
}
