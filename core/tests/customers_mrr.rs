//! Customers and the MRR movement ledger.
//!
//! The ledger must chain: every movement starts where the previous one
//! for the same customer ended, and the customer row agrees with the
//! last movement.

use chrono::NaiveDate;
use revlife_core::{
    assumptions::AssumptionSet,
    context::Dataset,
    customer_stage::decide_churn,
    engine::generate,
    model::{CompanySize, CustomerStatus, MovementType},
    rng::StageRng,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dataset() -> Dataset {
    let set = AssumptionSet::compact(date(2023, 1, 1), date(2024, 6, 30), 80)
        .expect("compact assumptions");
    generate(set, 2024).expect("generation run")
}

#[test]
fn one_customer_per_won_deal() {
    let data = dataset();
    let won: Vec<_> = data.opportunities.iter().filter(|o| o.is_won == Some(true)).collect();
    assert!(!won.is_empty(), "no deals won, widen the horizon");
    assert_eq!(won.len(), data.customers.len());

    for opp in won {
        let customer = data
            .customers
            .iter()
            .find(|c| c.opportunity_id == opp.opportunity_id)
            .expect("won deal has a customer");
        assert_eq!(Some(customer.start_date), opp.close_date);
        assert!((customer.initial_mrr - opp.amount / 12.0).abs() < 1e-9);
        assert_eq!(customer.company_size, opp.company_size);
        assert_eq!(customer.assigned_rep_id, opp.assigned_rep_id);
    }
}

#[test]
fn status_churn_date_and_mrr_agree() {
    let data = dataset();
    for c in &data.customers {
        match c.status {
            CustomerStatus::Churned => {
                let churned_on = c.churn_date.expect("churned customer has a churn date");
                assert!(churned_on > c.start_date, "{}", c.customer_id);
                assert!(churned_on <= data.horizon.end, "{}", c.customer_id);
                assert_eq!(c.current_mrr, 0.0, "{}", c.customer_id);
            }
            CustomerStatus::Active => {
                assert!(c.churn_date.is_none(), "{}", c.customer_id);
                assert!(c.current_mrr > 0.0, "{}", c.customer_id);
            }
        }
    }
}

#[test]
fn movement_ledger_chains_per_customer() {
    let data = dataset();
    let ledger = data.movements_by_customer();

    for c in &data.customers {
        let rows = ledger
            .get(c.customer_id.as_str())
            .expect("every customer has movements");
        let first = rows.first().expect("non-empty ledger");
        assert_eq!(first.movement_type, MovementType::New, "{}", c.customer_id);
        assert_eq!(first.movement_date, c.start_date);
        assert_eq!(first.previous_mrr, 0.0);

        for pair in rows.windows(2) {
            assert_eq!(
                pair[1].previous_mrr, pair[0].new_mrr,
                "{}: {} does not start where {} ended",
                c.customer_id, pair[1].movement_id, pair[0].movement_id
            );
            assert!(pair[1].movement_date >= pair[0].movement_date);
        }

        let last = rows.last().expect("non-empty ledger");
        assert_eq!(last.new_mrr, c.current_mrr, "{}", c.customer_id);
    }
}

#[test]
fn movement_amounts_are_signed_deltas() {
    let data = dataset();
    for m in &data.mrr_movements {
        assert!(m.new_mrr >= 0.0, "{}: negative MRR", m.movement_id);
        assert!(m.previous_mrr >= 0.0, "{}: negative MRR", m.movement_id);
        assert!(
            (m.amount - (m.new_mrr - m.previous_mrr)).abs() < 0.011,
            "{}: amount {} vs delta {}",
            m.movement_id, m.amount, m.new_mrr - m.previous_mrr
        );
        let cents = m.amount * 100.0;
        assert!(
            (cents - cents.round()).abs() < 1e-6,
            "{}: amount {} is not whole cents",
            m.movement_id, m.amount
        );
        match m.movement_type {
            MovementType::New | MovementType::Expansion => assert!(m.amount > 0.0),
            MovementType::Contraction => assert!(m.amount < 0.0),
            MovementType::Churn => assert_eq!(m.new_mrr, 0.0),
        }
    }
}

#[test]
fn nothing_happens_after_churn() {
    let data = dataset();
    let ledger = data.movements_by_customer();

    for c in data.customers.iter().filter(|c| !c.is_active()) {
        let rows = &ledger[c.customer_id.as_str()];
        let last = rows.last().expect("non-empty ledger");
        assert_eq!(last.movement_type, MovementType::Churn, "{}", c.customer_id);
        assert_eq!(Some(last.movement_date), c.churn_date);
        assert_eq!(
            rows.iter().filter(|m| m.movement_type == MovementType::Churn).count(),
            1,
            "{}: churned twice",
            c.customer_id
        );
    }
}

#[test]
fn churn_walk_never_leaves_the_horizon() {
    let mut set = AssumptionSet::compact(date(2023, 1, 1), date(2023, 12, 31), 10)
        .expect("compact assumptions");
    set.retention.base_monthly_churn = 1.0;
    set.retention.segment_churn_multipliers.values_mut().for_each(|m| *m = 1.0);
    let mut rng = StageRng::new(5, 3);

    for size in CompanySize::ALL {
        let start = date(2023, 12, 20);
        let churned = decide_churn(start, *size, &set.horizon, &set, &mut rng)
            .expect("certain churn fires on the first tick");
        assert!(churned > start);
        assert!(churned <= set.horizon.end);
    }

    set.retention.base_monthly_churn = 0.0;
    assert!(decide_churn(date(2023, 2, 1), CompanySize::Smb, &set.horizon, &set, &mut rng).is_none());
}
