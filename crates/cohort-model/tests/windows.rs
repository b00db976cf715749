use chrono::NaiveDate;
use cohort_model::{DateExpr, DateUnit, Window};
use proptest::prelude::*;

fn index_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn unit() -> impl Strategy<Value = DateUnit> {
    prop_oneof![Just(DateUnit::Day), Just(DateUnit::Month), Just(DateUnit::Year)]
}

proptest! {
    #[test]
    fn lookback_windows_are_never_inverted(
        index in index_date(),
        amount in 0i64..400,
        unit in unit(),
    ) {
        let start = DateExpr::IndexDate { offset: -amount, unit };
        let window = Window::Between(start, DateExpr::index_date());
        let resolved = window.resolve(index).unwrap();
        prop_assert!(resolved.is_ordered());
        prop_assert!(resolved.contains(index));
    }

    #[test]
    fn rendered_expressions_parse_back(amount in 0i64..400, unit in unit(), negative in any::<bool>()) {
        let offset = if negative { -amount } else { amount };
        let expr = DateExpr::IndexDate { offset, unit };
        let parsed: DateExpr = expr.to_string().parse().unwrap();
        let index = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        prop_assert_eq!(parsed.resolve(index).unwrap(), expr.resolve(index).unwrap());
    }
}

#[test]
fn study_windows_resolve_against_index() {
    let index = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
    let creatinine = Window::between("index_date - 5 years", "index_date - 14 days").unwrap();
    let resolved = creatinine.resolve(index).unwrap();
    assert_eq!(resolved.start, NaiveDate::from_ymd_opt(2015, 3, 1));
    assert_eq!(resolved.end, NaiveDate::from_ymd_opt(2020, 2, 16));

    let household = Window::as_of("2020-02-01").unwrap();
    let resolved = household.resolve(index).unwrap();
    assert_eq!(resolved.start, resolved.end);
}
