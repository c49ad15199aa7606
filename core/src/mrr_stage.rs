//! The MRR movement ledger.
//!
//! Independent of the churn walk, but bounded by it: a New movement on
//! the start date, then one expansion-or-contraction draw per 30-day tick
//! strictly before the churn date (or through the horizon for active
//! customers), then a terminal Churn movement for churned customers.
//! Every row carries the exact previous and new MRR, so the ledger
//! chains without gaps, and the customer's `current_mrr` is left at the
//! last `new_mrr`.
//!
//! Execution: after marketing. Depends on: customers.

use crate::{
    assumptions::AssumptionSet,
    calendar::add_days,
    context::GenerationContext,
    error::GenResult,
    model::{round_cents, MovementType, MrrMovement},
    rng::StageRng,
    stage::GenerationStage,
    types::{EntityId, SimDate, DAYS_PER_TICK},
};

pub struct MrrStage;

impl GenerationStage for MrrStage {
    fn name(&self) -> &'static str {
        "mrr"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let horizon_end = ctx.horizon.end;
        let before = ctx.mrr_movements.len();

        for idx in 0..ctx.customers.len() {
            let (customer_id, start, churn_date, initial_mrr) = {
                let c = &ctx.customers[idx];
                (c.customer_id.clone(), c.start_date, c.churn_date, c.initial_mrr)
            };
            let mut ledger = MrrLedger::open(&customer_id, ctx.mrr_movements.len());
            ledger.record(start, MovementType::New, initial_mrr);

            let mut tick = add_days(start, DAYS_PER_TICK);
            loop {
                let in_window = match churn_date {
                    Some(churn) => tick < churn,
                    None => tick <= horizon_end,
                };
                if !in_window {
                    break;
                }
                monthly_change(&mut ledger, tick, assumptions, rng);
                tick = add_days(tick, DAYS_PER_TICK);
            }

            if let Some(churn) = churn_date {
                ledger.record(churn, MovementType::Churn, 0.0);
            }

            let final_mrr = ledger.current;
            ctx.mrr_movements.extend(ledger.rows);
            ctx.customers[idx].current_mrr = final_mrr;
        }

        Ok(ctx.mrr_movements.len() - before)
    }
}

fn monthly_change(
    ledger: &mut MrrLedger,
    date: SimDate,
    assumptions: &AssumptionSet,
    rng: &mut StageRng,
) {
    let cfg = &assumptions.expansion;
    if rng.chance(cfg.monthly_expansion_probability) {
        let pct = cfg.expansion_percentage_range.sample(rng);
        let target = round_cents(ledger.current * (1.0 + pct));
        ledger.record(date, MovementType::Expansion, target);
    } else if rng.chance(cfg.monthly_contraction_probability) {
        let pct = cfg.contraction_percentage_range.sample(rng);
        let target = round_cents(ledger.current * (1.0 - pct)).max(0.0);
        ledger.record(date, MovementType::Contraction, target);
    }
}

/// Running MRR for one customer plus the rows recorded so far.
struct MrrLedger {
    customer_id: EntityId,
    next_id:     usize,
    current:     f64,
    rows:        Vec<MrrMovement>,
}

impl MrrLedger {
    fn open(customer_id: &str, existing_rows: usize) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            next_id: existing_rows + 1,
            current: 0.0,
            rows: Vec::new(),
        }
    }

    fn record(&mut self, movement_date: SimDate, movement_type: MovementType, new_mrr: f64) {
        let previous_mrr = self.current;
        self.rows.push(MrrMovement {
            movement_id: format!("MRR_{:07}", self.next_id),
            customer_id: self.customer_id.clone(),
            movement_date,
            movement_type,
            amount: round_cents(new_mrr - previous_mrr),
            previous_mrr,
            new_mrr,
        });
        self.next_id += 1;
        self.current = new_mrr;
    }
}
