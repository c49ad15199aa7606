//! Daily usage rows and the pre-churn decline ramp.

use chrono::{Datelike, NaiveDate, Weekday};
use revlife_core::{
    assumptions::AssumptionSet,
    calendar::days_between,
    context::Dataset,
    engine::generate,
    usage_stage::decline_multiplier,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dataset() -> Dataset {
    let mut set = AssumptionSet::compact(date(2023, 1, 1), date(2024, 6, 30), 80)
        .expect("compact assumptions");
    // More churn so the decline ramp is well represented.
    set.retention.base_monthly_churn = 0.08;
    generate(set, 99).expect("generation run")
}

#[test]
fn decline_ramp_shape() {
    // Churn on day 200 with a 60-day ramp to 20%.
    let churn_day = 200;
    let at = |day: i64| decline_multiplier(churn_day - day, 60, 0.2);

    assert_eq!(at(0), 1.0);
    assert_eq!(at(139), 1.0);
    assert_eq!(at(140), 1.0);
    assert!((at(170) - 0.6).abs() < 1e-9, "halfway should be 0.6, got {}", at(170));
    assert!((at(200) - 0.2).abs() < 1e-9, "churn date should be 0.2, got {}", at(200));

    let mut previous = f64::INFINITY;
    for day in 0..=churn_day {
        let m = at(day);
        assert!(m <= previous, "ramp rose on day {day}: {previous} -> {m}");
        assert!((0.2..=1.0).contains(&m));
        previous = m;
    }
}

#[test]
fn one_row_per_live_day() {
    let data = dataset();
    let usage = data.usage_by_customer();

    for c in &data.customers {
        let until = c.active_until(data.horizon.end);
        let rows = usage.get(c.customer_id.as_str()).expect("customer has usage");
        assert_eq!(
            rows.len() as i64,
            days_between(c.start_date, until) + 1,
            "{}: row count does not cover {}..{}",
            c.customer_id, c.start_date, until
        );
        assert_eq!(rows.first().map(|u| u.event_date), Some(c.start_date));
        assert_eq!(rows.last().map(|u| u.event_date), Some(until));
    }
}

#[test]
fn weekday_rows_always_have_an_active_member() {
    let data = dataset();
    for u in data
        .usage_events
        .iter()
        .filter(|u| !matches!(u.event_date.weekday(), Weekday::Sat | Weekday::Sun))
    {
        assert!(u.team_members_active >= 1, "{} on {}", u.event_id, u.event_date);
    }
}

#[test]
fn usage_falls_before_churn() {
    let data = dataset();
    let usage = data.usage_by_customer();

    let mut early = 0u64;
    let mut late = 0u64;
    let mut sampled = 0;
    for c in data.customers.iter().filter(|c| !c.is_active()) {
        let churn = c.churn_date.expect("churned customer has a churn date");
        if days_between(c.start_date, churn) < 120 {
            continue;
        }
        for u in &usage[c.customer_id.as_str()] {
            let remaining = days_between(u.event_date, churn);
            if (90..100).contains(&remaining) {
                early += u64::from(u.logins);
            } else if remaining < 10 {
                late += u64::from(u.logins);
            }
        }
        sampled += 1;
    }

    assert!(sampled > 0, "no long-lived churned customers to sample");
    assert!(
        late < early,
        "logins in the last 10 days ({late}) should trail the same window 90 days earlier ({early})"
    );
}
