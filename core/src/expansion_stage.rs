//! Expansion (upsell / cross-sell) opportunities for live customers.
//!
//! Only customers still active at the horizon are considered; a churned
//! customer never has an expansion row. From 90 days of tenure, each
//! 30-day check draws against the monthly expansion probability. Status
//! reflects how long the opportunity has had before the horizon ends:
//! fresh ones are Identified or In Progress, older ones are resolved to
//! Won or Lost.
//!
//! Execution: after nps. Depends on: customers, mrr (current_mrr).

use crate::{
    assumptions::AssumptionSet,
    calendar::{add_days, days_between, Horizon},
    context::GenerationContext,
    error::GenResult,
    model::{round_cents, ExpansionKind, ExpansionOpportunity, ExpansionStatus},
    rng::StageRng,
    stage::GenerationStage,
    types::{SimDate, DAYS_PER_TICK},
};

/// Opportunities younger than this at the horizon are still Identified.
const IDENTIFIED_WINDOW_DAYS: i64 = 30;
/// Opportunities younger than this at the horizon are still In Progress.
const IN_PROGRESS_WINDOW_DAYS: i64 = 60;

pub struct ExpansionStage;

impl GenerationStage for ExpansionStage {
    fn name(&self) -> &'static str {
        "expansion"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let cfg = &assumptions.expansion;
        let horizon = ctx.horizon;
        let annual_range = cfg.expansion_percentage_range.scaled(12.0);
        let before = ctx.expansion_opportunities.len();
        let mut found = Vec::new();

        for customer in ctx.customers.iter().filter(|c| c.is_active()) {
            let mut check = add_days(customer.start_date, cfg.first_check_after_days);
            while check <= horizon.end {
                if rng.chance(cfg.monthly_expansion_probability) {
                    let estimated_value = round_cents(customer.current_mrr * annual_range.sample(rng));
                    let (status, closed_date, actual_value) =
                        resolve(check, estimated_value, &horizon, assumptions, rng);
                    let opportunity_type = if rng.chance(0.5) {
                        ExpansionKind::Upsell
                    } else {
                        ExpansionKind::CrossSell
                    };
                    found.push(ExpansionOpportunity {
                        expansion_id: format!("EXP_{:06}", before + found.len() + 1),
                        customer_id: customer.customer_id.clone(),
                        identified_date: check,
                        opportunity_type,
                        estimated_value,
                        status,
                        closed_date,
                        actual_value,
                    });
                }
                check = add_days(check, DAYS_PER_TICK);
            }
        }

        ctx.expansion_opportunities.extend(found);
        Ok(ctx.expansion_opportunities.len() - before)
    }
}

fn resolve(
    identified: SimDate,
    estimated_value: f64,
    horizon: &Horizon,
    assumptions: &AssumptionSet,
    rng: &mut StageRng,
) -> (ExpansionStatus, Option<SimDate>, Option<f64>) {
    let cfg = &assumptions.expansion;
    let age_at_horizon = days_between(identified, horizon.end);
    if age_at_horizon < IDENTIFIED_WINDOW_DAYS {
        return (ExpansionStatus::Identified, None, None);
    }
    if age_at_horizon < IN_PROGRESS_WINDOW_DAYS {
        return (ExpansionStatus::InProgress, None, None);
    }

    let won = rng.chance(cfg.expansion_conversion_rate);
    let actual_value = if won {
        let jitter = rng.uniform(1.0 - cfg.won_value_variation, 1.0 + cfg.won_value_variation);
        Some(round_cents(estimated_value * jitter))
    } else {
        None
    };
    let closed_date = horizon.cap(add_days(identified, cfg.close_window_days.sample(rng)));
    let status = if won { ExpansionStatus::Won } else { ExpansionStatus::Lost };
    (status, Some(closed_date), actual_value)
}
