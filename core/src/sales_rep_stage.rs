//! Sales rep roster.
//!
//! Each rep gets a territory (segment focus) and a performance score drawn
//! from a normal distribution around 1.0, clamped to the configured band.
//! The score multiplies every gate conversion probability of the rep's
//! deals downstream.
//!
//! Execution: first. Depends on: nothing.

use crate::{
    assumptions::AssumptionSet,
    calendar::add_days,
    context::GenerationContext,
    error::GenResult,
    model::{round_3dp, CompanySize, SalesRep},
    name_generator::NameGenerator,
    rng::StageRng,
    stage::GenerationStage,
};

pub struct SalesRepStage;

impl GenerationStage for SalesRepStage {
    fn name(&self) -> &'static str {
        "sales_rep"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let cfg = &assumptions.sales_rep;
        let horizon_start = ctx.horizon.start;

        for i in 0..cfg.num_reps {
            let raw = rng.normal(1.0, cfg.performance_std_dev);
            let performance_score = round_3dp(raw.clamp(cfg.min_performance, cfg.max_performance));
            let name = NameGenerator::person_name(rng);
            let start_date = add_days(horizon_start, -cfg.hired_days_before_start.sample(rng));
            let segment_focus = match cfg.rep_segment_focus.get(i) {
                Some(size) => *size,
                None => rng.choose(CompanySize::ALL).copied().unwrap_or(CompanySize::MidMarket),
            };

            ctx.add_sales_rep(SalesRep {
                rep_id: format!("REP_{:03}", i + 1),
                name,
                start_date,
                segment_focus,
                performance_score,
                is_active: true,
            });
        }

        log::debug!("[sales_rep] {} reps hired", cfg.num_reps);
        Ok(cfg.num_reps)
    }
}
