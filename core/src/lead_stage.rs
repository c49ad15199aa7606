//! Lead generation with monthly seasonality.
//!
//! For every calendar month: a seasonal monthly volume with jitter, spread
//! over the days of the month with a second, per-day jitter. Each lead
//! independently draws channel, company size and industry, an ACV from
//! its segment's triangle, and a rep from the matching territory.
//!
//! Execution: after sales_rep. Depends on: sales reps.

use crate::{
    assumptions::AssumptionSet,
    context::GenerationContext,
    error::{GenError, GenResult},
    model::{round_cents, CompanySize, Lead},
    name_generator::NameGenerator,
    rng::StageRng,
    stage::GenerationStage,
    types::{EntityId, SimDate},
};
use chrono::Datelike;
use std::collections::BTreeMap;

pub struct LeadStage;

impl GenerationStage for LeadStage {
    fn name(&self) -> &'static str {
        "lead"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let cfg = &assumptions.lead_gen;
        let horizon = ctx.horizon;
        let pool = RepPool::from_context(ctx)?;
        let before = ctx.leads.len();

        for month in horizon.months() {
            let season = cfg.seasonality[month.first_day.month0() as usize];
            let seasonal = (cfg.base_leads_per_month as f64 * season).floor();
            let monthly = (seasonal
                * rng.uniform(1.0 - cfg.monthly_variation, 1.0 + cfg.monthly_variation))
            .floor();
            let per_day = monthly / month.days_in_month as f64;
            log::debug!(
                "[lead] {}: {monthly} leads planned",
                month.first_day.format("%Y-%m")
            );

            for day in month.days_within(&horizon) {
                let daily = (per_day
                    * rng.uniform(1.0 - cfg.daily_variation, 1.0 + cfg.daily_variation))
                .floor() as usize;
                for _ in 0..daily {
                    let lead_id = format!("LEAD_{:06}", ctx.leads.len() + 1);
                    let lead = create_lead(lead_id, day, assumptions, &pool, rng);
                    ctx.add_lead(lead);
                }
            }
        }

        Ok(ctx.leads.len() - before)
    }
}

fn create_lead(
    lead_id: EntityId,
    created_date: SimDate,
    assumptions: &AssumptionSet,
    pool: &RepPool,
    rng: &mut StageRng,
) -> Lead {
    let cfg = &assumptions.lead_gen;
    let channel = *cfg.channel_distribution.sample(rng);
    let company_size = *cfg.company_size_distribution.sample(rng);
    let industry = *cfg.industry_distribution.sample(rng);
    let estimated_acv = assumptions
        .deal_value
        .acv_by_segment
        .get(&company_size)
        .map(|acv| round_cents(acv.sample(rng)))
        .unwrap_or(0.0);
    let assigned_rep_id = pool.assign(company_size, rng);

    Lead {
        lead_id,
        created_date,
        channel,
        company_name: NameGenerator::company_name(rng, industry),
        company_size,
        industry,
        estimated_acv,
        assigned_rep_id,
    }
}

/// Reps grouped by territory. A segment without reps falls back to the
/// whole roster so every lead always has an owner.
struct RepPool {
    by_segment: BTreeMap<CompanySize, Vec<EntityId>>,
    everyone:   Vec<EntityId>,
}

impl RepPool {
    fn from_context(ctx: &GenerationContext) -> GenResult<Self> {
        let everyone: Vec<EntityId> = ctx.sales_reps.iter().map(|r| r.rep_id.clone()).collect();
        if everyone.is_empty() {
            return Err(GenError::MissingEntity { kind: "sales rep", id: "<any>".into() });
        }
        let mut by_segment: BTreeMap<CompanySize, Vec<EntityId>> = BTreeMap::new();
        for rep in &ctx.sales_reps {
            by_segment.entry(rep.segment_focus).or_default().push(rep.rep_id.clone());
        }
        for size in CompanySize::ALL {
            if !by_segment.contains_key(size) {
                log::debug!("[lead] no {size} reps; those leads go to the whole roster");
            }
        }
        Ok(Self { by_segment, everyone })
    }

    fn assign(&self, size: CompanySize, rng: &mut StageRng) -> EntityId {
        let candidates = match self.by_segment.get(&size) {
            Some(reps) if !reps.is_empty() => reps,
            _ => &self.everyone,
        };
        rng.choose(candidates).cloned().unwrap_or_default()
    }
}
