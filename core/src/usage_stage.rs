//! Daily product usage.
//!
//! One row per customer per day of its active window. Counters are the
//! segment baseline times per-metric uniform noise, dampened on weekends.
//! For customers with a churn date, a linear decline ramp pulls usage
//! down over the final `decline_start_days` so that falling usage
//! genuinely precedes churn in the data.
//!
//! Execution: after customer. Depends on: customers.

use crate::{
    assumptions::{AssumptionSet, UniformRange},
    calendar::{add_days, days_between, is_weekend},
    context::GenerationContext,
    error::GenResult,
    model::{CompanySize, UsageEvent, UsageMetric},
    rng::StageRng,
    stage::GenerationStage,
    types::{EntityId, SimDate},
};

pub struct UsageStage;

impl GenerationStage for UsageStage {
    fn name(&self) -> &'static str {
        "usage"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let horizon_end = ctx.horizon.end;
        let windows: Vec<(EntityId, CompanySize, SimDate, Option<SimDate>)> = ctx
            .customers
            .iter()
            .map(|c| (c.customer_id.clone(), c.company_size, c.start_date, c.churn_date))
            .collect();
        let before = ctx.usage_events.len();

        for (customer_id, size, start, churn_date) in windows {
            let end = churn_date.unwrap_or(horizon_end);
            let mut events = Vec::with_capacity((days_between(start, end) + 1).max(0) as usize);
            let mut day = start;
            while day <= end {
                let decline = match churn_date {
                    Some(churn) => decline_multiplier(
                        days_between(day, churn),
                        assumptions.usage.decline_start_days,
                        assumptions.usage.decline_final_percentage,
                    ),
                    None => 1.0,
                };
                let event_id = format!("USE_{:08}", ctx.usage_events.len() + events.len() + 1);
                events.push(daily_usage(event_id, &customer_id, day, size, decline, assumptions, rng));
                day = add_days(day, 1);
            }
            ctx.add_usage_events(&customer_id, events);
        }

        Ok(ctx.usage_events.len() - before)
    }
}

/// Share of baseline usage left `days_remaining` days before churn.
///
/// 1.0 until the ramp starts, then linear down to `final_percentage` on
/// the churn date itself. Non-increasing as the churn date approaches.
pub fn decline_multiplier(days_remaining: i64, decline_start_days: i64, final_percentage: f64) -> f64 {
    if decline_start_days <= 0 || days_remaining >= decline_start_days {
        return 1.0;
    }
    let progress = 1.0 - days_remaining.max(0) as f64 / decline_start_days as f64;
    1.0 - progress * (1.0 - final_percentage)
}

fn daily_usage(
    event_id: EntityId,
    customer_id: &str,
    event_date: SimDate,
    size: CompanySize,
    decline: f64,
    assumptions: &AssumptionSet,
    rng: &mut StageRng,
) -> UsageEvent {
    let weekend = is_weekend(event_date);
    let mut counter = |metric: UsageMetric, floor: f64| -> u32 {
        let noise = assumptions
            .usage
            .noise_by_metric
            .get(&metric)
            .copied()
            .unwrap_or(UniformRange::new(1.0, 1.0));
        let mut value = (assumptions.base_usage(size, metric) * decline * noise.sample(rng))
            .floor()
            .max(floor);
        if weekend {
            value = (value * assumptions.usage.weekend_factor).floor();
        }
        value as u32
    };

    UsageEvent {
        event_id,
        customer_id: customer_id.to_string(),
        event_date,
        logins: counter(UsageMetric::Logins, 0.0),
        api_calls: counter(UsageMetric::ApiCalls, 0.0),
        reports_generated: counter(UsageMetric::ReportsGenerated, 0.0),
        team_members_active: counter(UsageMetric::TeamMembersActive, 1.0),
        integrations_used: counter(UsageMetric::IntegrationsUsed, 0.0),
    }
}
