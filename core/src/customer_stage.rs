//! Customers from won deals, and the churn decision walk.
//!
//! One customer per Closed Won opportunity, starting on the close date at
//! `initial_mrr = amount / 12`. Churn is decided here, once: every 30-day
//! tick draws against the segment-adjusted monthly churn rate, and the
//! first hit fixes the churn date a few days later. Usage, MRR, NPS and
//! expansion all read that date; none of them re-decide it.
//!
//! Execution: after pipeline. Depends on: opportunities, leads.

use crate::{
    assumptions::AssumptionSet,
    calendar::{add_days, Horizon},
    context::GenerationContext,
    error::{GenError, GenResult},
    model::{CompanySize, Customer, CustomerStatus},
    rng::StageRng,
    stage::GenerationStage,
    types::{SimDate, DAYS_PER_TICK},
};

pub struct CustomerStage;

impl GenerationStage for CustomerStage {
    fn name(&self) -> &'static str {
        "customer"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let horizon = ctx.horizon;
        let mut created = Vec::new();

        for opportunity in ctx.opportunities.iter().filter(|o| o.is_won == Some(true)) {
            let start_date = opportunity.close_date.ok_or_else(|| GenError::MissingEntity {
                kind: "close date of won opportunity",
                id: opportunity.opportunity_id.clone(),
            })?;
            let company_name = ctx.lead(&opportunity.lead_id)?.company_name.clone();
            let churn_date =
                decide_churn(start_date, opportunity.company_size, &horizon, assumptions, rng);
            let initial_mrr = opportunity.amount / 12.0;

            created.push(Customer {
                customer_id: format!("CUST_{:06}", ctx.customers.len() + created.len() + 1),
                opportunity_id: opportunity.opportunity_id.clone(),
                company_name,
                company_size: opportunity.company_size,
                industry: opportunity.industry,
                channel: opportunity.channel,
                start_date,
                status: if churn_date.is_some() {
                    CustomerStatus::Churned
                } else {
                    CustomerStatus::Active
                },
                churn_date,
                current_mrr: if churn_date.is_some() { 0.0 } else { initial_mrr },
                initial_mrr,
                assigned_rep_id: opportunity.assigned_rep_id.clone(),
                latest_nps_score: None,
                health_score: None,
                churn_probability: None,
            });
        }

        let count = created.len();
        let churned = created.iter().filter(|c| !c.is_active()).count();
        for customer in created {
            ctx.add_customer(customer);
        }
        log::debug!("[customer] {count} customers, {churned} churned within horizon");
        Ok(count)
    }
}

/// Monthly churn walk. Returns the churn date, if churn fires before the
/// horizon ends.
pub fn decide_churn(
    start_date: SimDate,
    size: CompanySize,
    horizon: &Horizon,
    assumptions: &AssumptionSet,
    rng: &mut StageRng,
) -> Option<SimDate> {
    let retention = &assumptions.retention;
    let multiplier = retention
        .segment_churn_multipliers
        .get(&size)
        .copied()
        .unwrap_or(1.0);
    let monthly_churn = retention.base_monthly_churn * multiplier;

    let mut tick = start_date;
    while tick < horizon.end {
        if rng.chance(monthly_churn) {
            let offset = retention.churn_day_offset.sample(rng);
            return Some(horizon.cap(add_days(tick, offset)));
        }
        tick = add_days(tick, DAYS_PER_TICK);
    }
    None
}
