//! Dashboard analytics over a generated dataset.
//!
//! These are consistency checks: every figure must be derivable from the
//! rows and must agree with the other figures computed from them.

use chrono::NaiveDate;
use revlife_core::{
    assumptions::AssumptionSet,
    calendar::{add_days, days_between},
    churn_analytics::{self, churn_features},
    context::Dataset,
    engine::generate,
    error::GenError,
    funnel_analytics,
    health_analytics,
    model::{
        Channel, CompanySize, Customer, CustomerStatus, HealthScore, Industry, SegmentField,
        Stage, UsageEvent,
    },
    revenue_analytics,
};
use std::sync::OnceLock;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dataset() -> &'static Dataset {
    static DATA: OnceLock<Dataset> = OnceLock::new();
    DATA.get_or_init(|| {
        let set = AssumptionSet::compact(date(2023, 1, 1), date(2024, 12, 31), 80)
            .expect("compact assumptions");
        generate(set, 42).expect("generation run")
    })
}

// ── Funnel ───────────────────────────────────────────────────────────────

#[test]
fn funnel_summary_counts_every_opportunity() {
    let data = dataset();
    let summary = funnel_analytics::funnel_summary(data);

    assert_eq!(summary.total_opportunities, data.opportunities.len());
    assert_eq!(summary.closed_won_count, data.customers.len());
    let bucketed: usize = summary.stages.iter().map(|s| s.count).sum();
    assert_eq!(bucketed, data.opportunities.len());
    assert!((0.0..=1.0).contains(&summary.overall_conversion_rate));
}

#[test]
fn gate_conversion_narrows_down_the_funnel() {
    let data = dataset();
    let gates = funnel_analytics::stage_conversion_rates(data);
    assert_eq!(gates.len(), 5);
    assert_eq!(gates[0].from_count, data.opportunities.len());

    for gate in &gates {
        assert!(gate.to_count <= gate.from_count, "{} -> {}", gate.from_stage, gate.to_stage);
        assert!((0.0..=1.0).contains(&gate.conversion_rate));
    }
    for pair in gates.windows(2) {
        assert_eq!(pair[0].to_count, pair[1].from_count);
    }
    assert_eq!(gates[4].to_count, data.customers.len());
}

#[test]
fn segment_funnels_partition_the_pipeline() {
    let data = dataset();
    for field in [SegmentField::CompanySize, SegmentField::Channel, SegmentField::Industry] {
        let rows = funnel_analytics::funnel_by_segment(data, field);
        let total: usize = rows.iter().map(|r| r.total_opportunities).sum();
        assert_eq!(total, data.opportunities.len(), "{field:?}");
        for pair in rows.windows(2) {
            assert!(pair[0].won_value >= pair[1].won_value, "{field:?} not sorted by won value");
        }
    }
}

#[test]
fn loss_reason_shares_sum_to_one() {
    let data = dataset();
    let rows = funnel_analytics::loss_reasons(data);
    let lost = data.opportunities.iter().filter(|o| o.is_won == Some(false)).count();
    assert_eq!(rows.iter().map(|r| r.count).sum::<usize>(), lost);
    if lost > 0 {
        let share: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!((share - 1.0).abs() < 1e-9, "shares sum to {share}");
    }
}

#[test]
fn velocity_excludes_losses() {
    let data = dataset();
    let forward = data
        .stage_transitions
        .iter()
        .filter(|t| t.to_stage != Stage::ClosedLost)
        .count();
    let counted: usize = funnel_analytics::velocity_metrics(data).iter().map(|v| v.count).sum();
    assert_eq!(counted, forward);
}

#[test]
fn rep_and_channel_rollups_cover_all_wins() {
    let data = dataset();
    let reps = funnel_analytics::rep_performance(data);
    assert_eq!(reps.iter().map(|r| r.deals_won).sum::<usize>(), data.customers.len());

    let channels = funnel_analytics::cac_by_channel(data);
    assert_eq!(
        channels.iter().map(|c| c.customers_acquired).sum::<usize>(),
        data.customers.len()
    );

    let cohorts = funnel_analytics::cohort_analysis(data);
    assert_eq!(cohorts.iter().map(|c| c.leads).sum::<usize>(), data.opportunities.len());
}

// ── Revenue ──────────────────────────────────────────────────────────────

#[test]
fn summary_mrr_is_active_customer_mrr() {
    let data = dataset();
    let summary = revenue_analytics::revenue_summary(data);
    let active: f64 = data.customers.iter().filter(|c| c.is_active()).map(|c| c.current_mrr).sum();

    assert!((summary.current_mrr - active).abs() < 1e-6);
    assert!((summary.current_arr - active * 12.0).abs() < 1e-6);
    assert!(summary.nrr >= 0.0);
}

#[test]
fn full_horizon_waterfall_rebuilds_current_mrr() {
    let data = dataset();
    let steps = revenue_analytics::mrr_waterfall(data, Some((data.horizon.start, data.horizon.end)));

    let first = steps.first().expect("starting step");
    let last = steps.last().expect("ending step");
    assert!(first.is_total && last.is_total);
    assert_eq!(first.amount, 0.0, "nobody is live before the horizon starts");

    let moved: f64 = steps.iter().filter(|s| !s.is_total).map(|s| s.amount).sum();
    assert!((last.amount - (first.amount + moved)).abs() < 1e-6);

    let active: f64 = data.customers.iter().filter(|c| c.is_active()).map(|c| c.current_mrr).sum();
    assert!(
        (last.amount - active).abs() < 0.01 * data.customers.len().max(1) as f64,
        "ending MRR {} vs active MRR {active}",
        last.amount
    );
}

#[test]
fn default_waterfall_is_internally_consistent() {
    let data = dataset();
    let steps = revenue_analytics::mrr_waterfall(data, None);
    let mut running = steps[0].amount;
    for step in &steps[1..steps.len() - 1] {
        running += step.amount;
        assert!((step.running_total - running).abs() < 1e-6, "{}", step.category);
    }
    assert!((steps[steps.len() - 1].amount - running).abs() < 1e-6);
}

#[test]
fn months_between_counts_calendar_boundaries() {
    assert_eq!(revenue_analytics::months_between(date(2024, 1, 31), date(2024, 2, 1)), 1);
    assert_eq!(revenue_analytics::months_between(date(2023, 11, 15), date(2024, 2, 14)), 3);
    assert_eq!(revenue_analytics::months_between(date(2024, 5, 1), date(2024, 5, 31)), 0);
}

#[test]
fn risk_and_leakage_are_non_negative() {
    let data = dataset();
    let risk = revenue_analytics::revenue_at_risk(data);
    assert!(risk.total_arr_at_risk <= risk.total_arr + 1e-6);
    assert!((0.0..=1.0).contains(&risk.risk_percentage));

    let leakage = revenue_analytics::revenue_leakage(data);
    assert_eq!(leakage.len(), 4);
    for pair in leakage.windows(2) {
        assert!(pair[0].amount >= pair[1].amount);
    }
    assert!(leakage.iter().all(|l| l.amount >= 0.0));

    let economics = revenue_analytics::ltv_cac_summary(data);
    let counted: usize = economics.by_segment.iter().map(|s| s.customer_count).sum();
    assert_eq!(counted, data.customers.len());
}

// ── Churn ────────────────────────────────────────────────────────────────

#[test]
fn churn_summary_partitions_customers() {
    let data = dataset();
    let summary = churn_analytics::churn_summary(data);
    assert_eq!(summary.total_customers, data.customers.len());
    assert_eq!(summary.active_customers + summary.churned_customers, summary.total_customers);

    let by_size = churn_analytics::churn_by_segment(data, SegmentField::CompanySize);
    assert_eq!(
        by_size.iter().map(|s| s.churned_customers).sum::<usize>(),
        summary.churned_customers
    );

    let cohorts = churn_analytics::churn_cohorts(data);
    assert_eq!(cohorts.iter().map(|c| c.total_customers).sum::<usize>(), summary.total_customers);
}

#[test]
fn at_risk_list_respects_filters() {
    let data = dataset();
    let rows = churn_analytics::at_risk_customers(data, 0.5, 100.0);
    for row in &rows {
        assert!(row.churn_probability >= 0.5);
        assert!(row.current_mrr >= 100.0);
    }
    for pair in rows.windows(2) {
        assert!(pair[0].arr_at_risk >= pair[1].arr_at_risk);
    }
}

#[test]
fn intervention_plan_stays_within_budget() {
    let data = dataset();
    let plan = churn_analytics::intervention_plan(data, 1_200.0);
    assert!(plan.recommendations.len() <= 2);
    assert!(plan.total_cost <= 1_200.0);
    for (i, r) in plan.recommendations.iter().enumerate() {
        assert_eq!(r.priority, i + 1);
    }
}

#[test]
fn drivers_for_unknown_customer_is_an_error() {
    let data = dataset();
    match churn_analytics::churn_drivers(data, "CUST_999999") {
        Err(GenError::MissingEntity { kind, .. }) => assert_eq!(kind, "customer"),
        other => panic!("expected MissingEntity, got {other:?}"),
    }
    if let Some(c) = data.customers.first() {
        churn_analytics::churn_drivers(data, &c.customer_id).expect("drivers for a known customer");
    }
}

#[test]
fn features_from_a_fading_customer() {
    let as_of = date(2024, 1, 31);
    let customer = Customer {
        customer_id: "CUST_000001".into(),
        opportunity_id: "OPP_000001".into(),
        company_name: "Fading Co".into(),
        company_size: CompanySize::MidMarket,
        industry: Industry::Retail,
        channel: Channel::Events,
        start_date: date(2023, 6, 1),
        status: CustomerStatus::Active,
        churn_date: None,
        current_mrr: 2_000.0,
        initial_mrr: 2_000.0,
        assigned_rep_id: "REP_001".into(),
        latest_nps_score: Some(5),
        health_score: Some(HealthScore::Red),
        churn_probability: Some(0.7),
    };
    // Ten logins a day through Jan 16, five through Jan 28, then nothing.
    let events: Vec<UsageEvent> = (0..31)
        .map(|i| {
            let day = add_days(date(2024, 1, 1), i);
            let logins = match i {
                0..=15 => 10,
                16..=27 => 5,
                _ => 0,
            };
            UsageEvent {
                event_id: format!("USE_{i:08}"),
                customer_id: customer.customer_id.clone(),
                event_date: day,
                logins,
                api_calls: 100,
                reports_generated: 1,
                team_members_active: 3,
                integrations_used: 1,
            }
        })
        .collect();
    let refs: Vec<&UsageEvent> = events.iter().collect();

    let f = churn_features(&customer, &refs, as_of);
    assert!(!f.churned);
    assert_eq!(f.tenure_days, days_between(customer.start_date, as_of));
    assert_eq!(f.days_since_login, 3);
    assert!((f.avg_logins_30d - 220.0 / 31.0).abs() < 1e-9, "got {}", f.avg_logins_30d);
    assert!((f.usage_trend - (-0.6)).abs() < 1e-9, "got {}", f.usage_trend);
    assert_eq!(f.avg_api_calls_30d, 100.0);
    assert!(f.login_volatility > 0.0);

    let silent = churn_features(&customer, &[], as_of);
    assert_eq!(silent.days_since_login, churn_analytics::NO_LOGIN_DAYS);
    // No prior window reads as a baseline of one login a day.
    assert_eq!(silent.usage_trend, -1.0);
}

#[test]
fn feature_table_has_a_row_per_customer() {
    let data = dataset();
    let table = churn_analytics::feature_table(data);
    assert_eq!(table.len(), data.customers.len());
    assert_eq!(
        table.iter().filter(|f| f.churned).count(),
        data.customers.iter().filter(|c| !c.is_active()).count()
    );
}

// ── Health ───────────────────────────────────────────────────────────────

#[test]
fn health_shares_sum_to_one() {
    let data = dataset();
    let dist = health_analytics::health_distribution(data);
    let active = data.customers.iter().filter(|c| c.is_active()).count();
    assert_eq!(dist.total_customers, active);

    if active > 0 {
        let share: f64 = HealthScore::ALL.iter().map(|s| dist.band(*s).percentage).sum();
        assert!((share - 1.0).abs() < 1e-9, "shares sum to {share}");
    }

    let by_segment = health_analytics::health_by_segment(data, SegmentField::CompanySize);
    let segmented: usize = by_segment.iter().map(|s| s.distribution.total_customers).sum();
    assert_eq!(segmented, active);
}

#[test]
fn customers_by_health_is_sorted_and_limited() {
    let data = dataset();
    let rows = health_analytics::customers_by_health(data, HealthScore::Green, 5);
    assert!(rows.len() <= 5);
    for pair in rows.windows(2) {
        assert!(pair[0].current_mrr >= pair[1].current_mrr);
    }
}
