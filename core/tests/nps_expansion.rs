//! NPS surveys and expansion opportunities both hang off the churn date
//! decided at customer creation. Neither may reach past it.

use chrono::NaiveDate;
use revlife_core::{
    assumptions::AssumptionSet,
    calendar::{add_days, days_between},
    context::Dataset,
    engine::generate,
    model::{ExpansionStatus, HealthBucket},
    nps_stage::survey_bucket,
};
use std::collections::HashMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dataset() -> Dataset {
    let set = AssumptionSet::compact(date(2023, 1, 1), date(2024, 9, 30), 80)
        .expect("compact assumptions");
    generate(set, 314).expect("generation run")
}

#[test]
fn survey_bucket_follows_distance_to_churn() {
    let set = AssumptionSet::standard().expect("standard assumptions");
    let churn = date(2024, 6, 30);

    assert_eq!(survey_bucket(date(2024, 1, 1), None, &set), HealthBucket::Healthy);
    assert_eq!(survey_bucket(add_days(churn, -120), Some(churn), &set), HealthBucket::Healthy);
    assert_eq!(survey_bucket(add_days(churn, -90), Some(churn), &set), HealthBucket::Healthy);
    assert_eq!(survey_bucket(add_days(churn, -89), Some(churn), &set), HealthBucket::AtRisk);
    assert_eq!(survey_bucket(add_days(churn, -30), Some(churn), &set), HealthBucket::AtRisk);
    assert_eq!(survey_bucket(add_days(churn, -29), Some(churn), &set), HealthBucket::Churning);
}

#[test]
fn surveys_fall_inside_the_live_window() {
    let data = dataset();
    let by_id: HashMap<&str, _> = data.customers.iter().map(|c| (c.customer_id.as_str(), c)).collect();

    assert!(!data.nps_surveys.is_empty(), "no surveys generated");
    for s in &data.nps_surveys {
        let c = by_id[s.customer_id.as_str()];
        assert!(s.survey_date > c.start_date, "{}: before start", s.survey_id);
        assert!(
            s.survey_date <= c.active_until(data.horizon.end),
            "{}: after the customer left",
            s.survey_id
        );
        assert_eq!(s.responded, s.score.is_some(), "{}", s.survey_id);
        if let Some(score) = s.score {
            assert!(score <= 10, "{}: score {score}", s.survey_id);
        }
        if !s.responded {
            assert!(s.response_text.is_none());
        }
    }
}

#[test]
fn latest_nps_is_the_last_response() {
    let data = dataset();
    for c in &data.customers {
        let last = data
            .nps_surveys
            .iter()
            .filter(|s| s.customer_id == c.customer_id)
            .filter_map(|s| s.score)
            .last();
        assert_eq!(c.latest_nps_score, last, "{}", c.customer_id);
    }
}

#[test]
fn churned_customers_have_no_expansion() {
    let data = dataset();
    let by_id: HashMap<&str, _> = data.customers.iter().map(|c| (c.customer_id.as_str(), c)).collect();

    for e in &data.expansion_opportunities {
        let c = by_id[e.customer_id.as_str()];
        assert!(c.is_active(), "{} belongs to churned {}", e.expansion_id, c.customer_id);
        assert!(days_between(c.start_date, e.identified_date) >= 90, "{}", e.expansion_id);
        assert!(e.identified_date <= data.horizon.end);
        assert!(e.estimated_value > 0.0);
    }
}

#[test]
fn expansion_status_matches_its_age() {
    let data = dataset();
    for e in &data.expansion_opportunities {
        let age = days_between(e.identified_date, data.horizon.end);
        match e.status {
            ExpansionStatus::Identified => {
                assert!(age < 30, "{}", e.expansion_id);
                assert!(e.closed_date.is_none() && e.actual_value.is_none());
            }
            ExpansionStatus::InProgress => {
                assert!((30..60).contains(&age), "{}", e.expansion_id);
                assert!(e.closed_date.is_none() && e.actual_value.is_none());
            }
            ExpansionStatus::Won | ExpansionStatus::Lost => {
                assert!(age >= 60, "{}", e.expansion_id);
                let closed = e.closed_date.expect("resolved expansion has a close date");
                assert!(closed > e.identified_date && closed <= data.horizon.end);
                assert_eq!(e.status == ExpansionStatus::Won, e.actual_value.is_some());
            }
        }
    }
}
