//! Monthly marketing spend per channel.
//!
//! Execution: after usage. Depends on: nothing but the horizon; it sits
//! here so the stage order matches the persisted table order.

use crate::{
    assumptions::AssumptionSet,
    context::GenerationContext,
    error::GenResult,
    model::{round_cents, MarketingSpend},
    rng::StageRng,
    stage::GenerationStage,
};

pub struct MarketingStage;

impl GenerationStage for MarketingStage {
    fn name(&self) -> &'static str {
        "marketing"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let cfg = &assumptions.marketing;
        let horizon = ctx.horizon;
        let before = ctx.marketing_spend.len();

        for month in horizon.months() {
            let period_start = month.first_day.max(horizon.start);
            let period_end = month.last_day.min(horizon.end);
            let label = period_start.format("%B %Y").to_string();

            for (channel, base) in &cfg.monthly_spend_by_channel {
                let amount = round_cents(base * rng.uniform(1.0 - cfg.spend_cv, 1.0 + cfg.spend_cv));
                ctx.marketing_spend.push(MarketingSpend {
                    spend_id: format!("SPEND_{:04}", ctx.marketing_spend.len() + 1),
                    channel: *channel,
                    period_start,
                    period_end,
                    amount,
                    campaign_name: format!("{channel} - {label}"),
                });
            }
        }

        Ok(ctx.marketing_spend.len() - before)
    }
}
