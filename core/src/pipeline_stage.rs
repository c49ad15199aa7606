//! Opportunity pipeline and the stage transition ledger.
//!
//! Every lead becomes one opportunity that walks
//! Lead → MQL → SQL → Opportunity → Negotiation → Closed Won,
//! with one Bernoulli attempt per gate:
//!   - success: time in stage is exponential around the segment-adjusted
//!     median; a transition that would land past the horizon stops the
//!     walk and the deal stays open at its last recorded stage
//!   - failure at the first gate: the lead simply never qualified
//!   - failure later: Closed Lost a few days on, with a stage-specific
//!     loss reason
//!
//! The ledger is authoritative: `current_stage` only moves after its
//! transition row exists, so it always equals the last `to_stage`.
//!
//! Execution: after lead. Depends on: leads, sales reps.

use crate::{
    assumptions::AssumptionSet,
    calendar::{add_days, days_between, Horizon},
    context::GenerationContext,
    error::GenResult,
    model::{Channel, CompanySize, Lead, Opportunity, Stage, StageGate, StageTransition},
    rng::StageRng,
    stage::GenerationStage,
};

pub struct PipelineStage;

impl GenerationStage for PipelineStage {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let horizon = ctx.horizon;
        let mut next_transition = ctx.stage_transitions.len() + 1;
        let mut walked = Vec::with_capacity(ctx.leads.len());

        for lead in &ctx.leads {
            let performance = ctx.sales_rep(&lead.assigned_rep_id)?.performance_score;
            let opportunity_id = format!("OPP_{:06}", ctx.opportunities.len() + walked.len() + 1);
            let walk = walk_opportunity(
                opportunity_id,
                lead,
                performance,
                &horizon,
                assumptions,
                rng,
                &mut next_transition,
            );
            walked.push(walk);
        }

        let count = walked.len();
        let mut won = 0usize;
        for (opportunity, transitions) in walked {
            if opportunity.is_won == Some(true) {
                won += 1;
            }
            ctx.add_opportunity(opportunity, transitions);
        }
        log::debug!("[pipeline] {count} opportunities, {won} won");
        Ok(count)
    }
}

/// Probability that a deal clears `gate`.
pub fn conversion_probability(
    assumptions: &AssumptionSet,
    gate: StageGate,
    size: CompanySize,
    channel: Channel,
    rep_performance: f64,
) -> f64 {
    let quality = assumptions
        .conversion
        .channel_quality
        .get(&channel)
        .copied()
        .unwrap_or(1.0);
    (assumptions.gate_base(gate, size) * quality * rep_performance)
        .min(assumptions.conversion.max_conversion_probability)
}

/// Days spent in the stage before `gate`. Always at least one.
pub fn days_in_stage(
    assumptions: &AssumptionSet,
    gate: StageGate,
    size: CompanySize,
    rng: &mut StageRng,
) -> i64 {
    let velocity = &assumptions.velocity;
    let median = velocity.median_stage_days.get(&gate).copied().unwrap_or(1.0);
    let segment = velocity
        .segment_velocity_multipliers
        .get(&size)
        .copied()
        .unwrap_or(1.0);
    let mean = median * segment * velocity.cv;
    (rng.exponential(mean).floor() as i64).max(1)
}

fn walk_opportunity(
    opportunity_id: String,
    lead: &Lead,
    rep_performance: f64,
    horizon: &Horizon,
    assumptions: &AssumptionSet,
    rng: &mut StageRng,
    next_transition: &mut usize,
) -> (Opportunity, Vec<StageTransition>) {
    let mut opportunity = Opportunity {
        opportunity_id,
        lead_id: lead.lead_id.clone(),
        created_date: lead.created_date,
        current_stage: Stage::Lead,
        amount: lead.estimated_acv,
        close_date: None,
        is_won: None,
        loss_reason: None,
        assigned_rep_id: lead.assigned_rep_id.clone(),
        company_size: lead.company_size,
        channel: lead.channel,
        industry: lead.industry,
    };
    let mut ledger = Vec::new();
    let mut clock = lead.created_date;

    for &gate in StageGate::ALL {
        let p = conversion_probability(
            assumptions,
            gate,
            lead.company_size,
            lead.channel,
            rep_performance,
        );

        if rng.chance(p) {
            let days = days_in_stage(assumptions, gate, lead.company_size, rng);
            let transition_date = add_days(clock, days);
            if transition_date > horizon.end {
                break;
            }
            ledger.push(StageTransition {
                transition_id: format!("TRANS_{:07}", *next_transition),
                opportunity_id: opportunity.opportunity_id.clone(),
                from_stage: opportunity.current_stage,
                to_stage: gate.to_stage(),
                transition_date,
                days_in_previous_stage: days,
            });
            *next_transition += 1;
            clock = transition_date;
            opportunity.current_stage = gate.to_stage();

            if opportunity.current_stage == Stage::ClosedWon {
                opportunity.is_won = Some(true);
                opportunity.close_date = Some(transition_date);
            }
            continue;
        }

        if opportunity.current_stage != Stage::Lead {
            let lost_on = horizon.cap(add_days(clock, assumptions.conversion.loss_delay_days.sample(rng)));
            let days = days_between(clock, lost_on);
            // No room left before the horizon: the deal stays open.
            if days >= 1 {
                let lost_from = opportunity.current_stage;
                let reason = assumptions
                    .conversion
                    .loss_reasons
                    .get(&lost_from)
                    .map(|reasons| reasons.sample(rng).clone());
                ledger.push(StageTransition {
                    transition_id: format!("TRANS_{:07}", *next_transition),
                    opportunity_id: opportunity.opportunity_id.clone(),
                    from_stage: lost_from,
                    to_stage: Stage::ClosedLost,
                    transition_date: lost_on,
                    days_in_previous_stage: days,
                });
                *next_transition += 1;
                opportunity.current_stage = Stage::ClosedLost;
                opportunity.is_won = Some(false);
                opportunity.close_date = Some(lost_on);
                opportunity.loss_reason = reason;
            }
        }
        break;
    }

    (opportunity, ledger)
}
