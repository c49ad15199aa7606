//! Pipeline walk: gate probabilities, the stage ledger, and the
//! opportunity fields derived from it.

use chrono::NaiveDate;
use revlife_core::{
    assumptions::AssumptionSet,
    context::Dataset,
    engine::generate,
    model::{Channel, CompanySize, Stage, StageGate},
    pipeline_stage::conversion_probability,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dataset() -> Dataset {
    let set = AssumptionSet::compact(date(2023, 1, 1), date(2023, 12, 31), 80)
        .expect("compact assumptions");
    generate(set, 11).expect("generation run")
}

#[test]
fn referral_smb_lead_gate_combines_every_factor() {
    let set = AssumptionSet::standard().expect("standard assumptions");
    // 0.40 base, 1.15 SMB multiplier, 1.25 referral quality.
    let p = conversion_probability(&set, StageGate::LeadToMql, CompanySize::Smb, Channel::Referral, 1.0);
    assert!((p - 0.575).abs() < 1e-9, "got {p}");

    let strong = conversion_probability(&set, StageGate::LeadToMql, CompanySize::Smb, Channel::Referral, 1.2);
    assert!((strong - 0.69).abs() < 1e-9, "got {strong}");
}

#[test]
fn gate_probability_is_clipped() {
    let set = AssumptionSet::standard().expect("standard assumptions");
    let p = conversion_probability(&set, StageGate::LeadToMql, CompanySize::Smb, Channel::Referral, 2.0);
    assert_eq!(p, set.conversion.max_conversion_probability);
}

#[test]
fn every_lead_has_at_most_one_opportunity() {
    let data = dataset();
    assert!(!data.opportunities.is_empty(), "no opportunities generated");
    assert!(data.opportunities.len() <= data.leads.len());

    let mut lead_ids: Vec<&str> = data.opportunities.iter().map(|o| o.lead_id.as_str()).collect();
    lead_ids.sort_unstable();
    lead_ids.dedup();
    assert_eq!(lead_ids.len(), data.opportunities.len(), "a lead produced two opportunities");
}

#[test]
fn ledger_rows_are_ordered_and_positive() {
    let data = dataset();
    let ledger = data.transitions_by_opportunity();

    for opp in &data.opportunities {
        let Some(rows) = ledger.get(opp.opportunity_id.as_str()) else {
            continue;
        };
        let mut previous = opp.created_date;
        for row in rows {
            assert!(row.days_in_previous_stage >= 1, "{}: zero-day stage", row.transition_id);
            assert!(row.transition_date >= previous, "{}: out of order", row.transition_id);
            assert!(data.horizon.contains(row.transition_date), "{}: outside horizon", row.transition_id);
            assert!(row.from_stage < row.to_stage, "{}: backwards step", row.transition_id);
            previous = row.transition_date;
        }
    }
}

#[test]
fn current_stage_is_the_last_ledger_step() {
    let data = dataset();
    let ledger = data.transitions_by_opportunity();

    for opp in &data.opportunities {
        let last = ledger
            .get(opp.opportunity_id.as_str())
            .and_then(|rows| rows.last())
            .map(|row| row.to_stage)
            .unwrap_or(Stage::Lead);
        assert_eq!(opp.current_stage, last, "{}", opp.opportunity_id);
    }
}

#[test]
fn closed_fields_agree_with_outcome() {
    let data = dataset();
    for opp in &data.opportunities {
        match opp.is_won {
            Some(true) => {
                assert_eq!(opp.current_stage, Stage::ClosedWon);
                assert!(opp.close_date.is_some());
                assert!(opp.loss_reason.is_none());
            }
            Some(false) => {
                assert_eq!(opp.current_stage, Stage::ClosedLost);
                assert!(opp.close_date.is_some());
                assert!(opp.loss_reason.is_some(), "{}: lost without a reason", opp.opportunity_id);
            }
            None => {
                assert!(opp.is_open());
                assert!(!opp.current_stage.is_closed());
                assert!(opp.close_date.is_none());
            }
        }
    }
}

#[test]
fn deals_inherit_lead_segment_and_rep() {
    let data = dataset();
    for opp in &data.opportunities {
        let lead = data
            .leads
            .iter()
            .find(|l| l.lead_id == opp.lead_id)
            .expect("opportunity lead exists");
        assert_eq!(opp.company_size, lead.company_size);
        assert_eq!(opp.channel, lead.channel);
        assert_eq!(opp.assigned_rep_id, lead.assigned_rep_id);
        assert!(opp.created_date >= lead.created_date);
    }
}
